use std::collections::BTreeMap;

use pinwire::sim;
use pinwire_codec::command::{PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};
use pinwire_engine::EngineConfig;
use serde::Serialize;

use crate::cmd::{load_config, EnvinfoArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, schema_id, table, OutputFormat};

const ENV_KEYS: [&str; 2] = ["PINWIRE_CONFIG", "RUST_LOG"];

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
    protocol_version: String,
    target: &'static str,
    rust_version: &'static str,
    git_hash: &'static str,
    features: Vec<&'static str>,
}

/// What `pinwire serve` would present to a host with the loaded config.
#[derive(Serialize)]
struct BoardInfo {
    firmware: String,
    total_pins: u8,
    ignored_pins: Vec<u8>,
    sampling_interval_ms: u32,
    max_sysex_size: usize,
    max_response_size: usize,
    max_block_size: usize,
    features: Vec<String>,
    device_classes: Vec<String>,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    schema_id: String,
    build: BuildInfo,
    board: BoardInfo,
    environment: BTreeMap<&'static str, Option<String>>,
}

pub fn run(args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let board = describe_board(&config)?;

    let output = EnvInfoOutput {
        schema_id: schema_id("envinfo"),
        build: build_info(),
        board,
        environment: ENV_KEYS
            .into_iter()
            .map(|key| (key, std::env::var(key).ok()))
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => print_table(&output),
        OutputFormat::Raw => println!("{}", output.build.version),
    }
    Ok(SUCCESS)
}

fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: format!("{PROTOCOL_VERSION_MAJOR}.{PROTOCOL_VERSION_MINOR}"),
        target: option_env!("PINWIRE_BUILD_TARGET").unwrap_or("unknown"),
        rust_version: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        features: [("async", cfg!(feature = "async")), ("cli", cfg!(feature = "cli"))]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect(),
    }
}

fn describe_board(config: &EngineConfig) -> CliResult<BoardInfo> {
    let registry = sim::board(config)
        .map_err(|err| CliError::new(INTERNAL, format!("board setup failed: {err}")))?;
    Ok(BoardInfo {
        firmware: format!(
            "{} {}.{}",
            config.firmware_name, config.firmware_major, config.firmware_minor
        ),
        total_pins: config.total_pins,
        ignored_pins: config.ignored_pins.clone(),
        sampling_interval_ms: config.sampling_interval_ms,
        max_sysex_size: config.max_sysex_size,
        max_response_size: config.max_response_size,
        max_block_size: config.max_block_size,
        features: registry
            .feature_names()
            .into_iter()
            .map(String::from)
            .collect(),
        device_classes: sim::drivers()
            .class_names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

fn print_table(output: &EnvInfoOutput) {
    let build = &output.build;
    let board = &output.board;
    let mut t = table(vec!["Key", "Value"]);
    t.add_row(vec!["Version", build.version]);
    t.add_row(vec!["Protocol", build.protocol_version.as_str()]);
    t.add_row(vec!["Target", build.target]);
    t.add_row(vec!["Rust", build.rust_version]);
    t.add_row(vec!["Git hash", build.git_hash]);
    t.add_row(vec!["Features".to_string(), build.features.join(", ")]);
    t.add_row(vec!["Firmware".to_string(), board.firmware.clone()]);
    t.add_row(vec!["Pins".to_string(), pins_summary(board)]);
    t.add_row(vec![
        "Sampling".to_string(),
        format!("{} ms", board.sampling_interval_ms),
    ]);
    t.add_row(vec![
        "Sysex limits".to_string(),
        format!("{} in / {} out", board.max_sysex_size, board.max_response_size),
    ]);
    t.add_row(vec!["Handlers".to_string(), board.features.join(", ")]);
    t.add_row(vec!["Device classes".to_string(), board.device_classes.join(", ")]);
    for (key, value) in &output.environment {
        t.add_row(vec![
            key.to_string(),
            value.clone().unwrap_or_else(|| "(not set)".to_string()),
        ]);
    }
    println!("{t}");
}

fn pins_summary(board: &BoardInfo) -> String {
    if board.ignored_pins.is_empty() {
        return board.total_pins.to_string();
    }
    let ignored: Vec<String> = board.ignored_pins.iter().map(u8::to_string).collect();
    format!("{} (ignored: {})", board.total_pins, ignored.join(", "))
}
