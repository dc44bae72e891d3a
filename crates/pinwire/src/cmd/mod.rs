use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pinwire_codec::Origin;
use pinwire_engine::EngineConfig;

use crate::exit::{engine_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod device;
pub mod envinfo;
pub mod probe;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine on a simulated board.
    Serve(ServeArgs),
    /// Query a board's firmware, capabilities and limits.
    Probe(ProbeArgs),
    /// Open a device session and run register operations against it.
    Device(DeviceArgs),
    /// Decode hex-encoded wire bytes into messages.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Probe(args) => probe::run(args, format),
        Command::Device(args) => device::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to listen on.
    #[arg(required_unless_present = "stdio", conflicts_with = "stdio")]
    pub path: Option<PathBuf>,
    /// Speak the protocol on stdin/stdout instead of a socket.
    #[arg(long)]
    pub stdio: bool,
    /// JSON engine configuration file.
    #[arg(long, value_name = "FILE", env = "PINWIRE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Exit after the first host disconnects.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Time allowed for connecting and for each reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Device identity, e.g. `i2c-temp-sensor:0x48`.
    pub identity: String,
    /// Open flags (7 bits).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..0x80))]
    pub flags: u8,
    /// Operation to run after Open, in order: `read:REG:COUNT`,
    /// `status:REG:COUNT`, `write:REG:HEX` or `control:REG:HEX`.
    #[arg(long = "op", value_name = "OP", value_parser = device::parse_op)]
    pub ops: Vec<device::DeviceOp>,
    /// Time allowed for connecting and for each reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Side {
    Host,
    Board,
}

impl From<Side> for Origin {
    fn from(side: Side) -> Self {
        match side {
            Side::Host => Origin::Host,
            Side::Board => Origin::Board,
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes to decode. Read from stdin when omitted.
    pub hex: Vec<String>,
    /// Which end sent the bytes.
    #[arg(long, value_enum, default_value = "host")]
    pub from: Side,
    /// Largest sysex body accepted.
    #[arg(long, default_value_t = 1024)]
    pub max_sysex: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {
    /// Engine config file to describe instead of the defaults.
    #[arg(long, value_name = "FILE", env = "PINWIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Load the engine config named on the command line, or the defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .map_err(|err| engine_error(&format!("config {}", path.display()), err)),
        None => Ok(EngineConfig::default()),
    }
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("timeout must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
