mod cmd;
mod exit;
mod link;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pinwire", version, about = "Firmata-style board protocol tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_on_socket() {
        let cli = Cli::try_parse_from(["pinwire", "serve", "/tmp/board.sock", "--once"])
            .expect("serve args should parse");
        match cli.command {
            Command::Serve(args) => {
                assert!(args.once);
                assert!(!args.stdio);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_needs_path_or_stdio() {
        let err = Cli::try_parse_from(["pinwire", "serve"]).expect_err("missing transport");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["pinwire", "serve", "/tmp/b.sock", "--stdio"])
            .expect_err("conflicting transports");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn device_ops_keep_their_order() {
        let cli = Cli::try_parse_from([
            "pinwire",
            "device",
            "/tmp/board.sock",
            "eeprom:1",
            "--op",
            "write:0:0102",
            "--op",
            "read:0:2",
        ])
        .expect("device args should parse");
        let Command::Device(args) = cli.command else {
            panic!("expected device command");
        };
        assert_eq!(args.ops.len(), 2);
        assert!(matches!(args.ops[0], cmd::device::DeviceOp::Write { .. }));
        assert!(matches!(args.ops[1], cmd::device::DeviceOp::Read { .. }));
    }

    #[test]
    fn rejects_malformed_device_op() {
        let err = Cli::try_parse_from([
            "pinwire",
            "device",
            "/tmp/board.sock",
            "eeprom:1",
            "--op",
            "erase:0:1",
        ])
        .expect_err("unknown action should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "pinwire", "decode", "f9", "--from", "board", "--format", "json",
        ])
        .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
