use std::time::Duration;

use pinwire_codec::command::{
    CAPABILITY_PIN_END, CAPABILITY_QUERY, CAPABILITY_RESPONSE, REPORT_FIRMWARE, REPORT_VERSION,
    SYSTEM_VARIABLE,
};
use pinwire_codec::{decode_string_data, Message};
use pinwire_registry::{
    PinMode, SystemVariable, SystemVariableStatus, SYSVAR_MAX_SYSEX, SYSVAR_RECEIVE_BUFFER,
};
use serde::Serialize;

use crate::cmd::{parse_timeout, ProbeArgs};
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::link::HostLink;
use crate::output::{print_json, schema_id, table, OutputFormat};

#[derive(Serialize, Debug, PartialEq, Eq)]
struct ModeInfo {
    mode: &'static str,
    code: u8,
    resolution: u8,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct PinInfo {
    pin: u8,
    modes: Vec<ModeInfo>,
}

#[derive(Serialize)]
struct FirmwareInfo {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct BoardInfoOutput {
    schema_id: String,
    protocol_version: String,
    firmware: FirmwareInfo,
    max_sysex_size: Option<i32>,
    receive_buffer_size: Option<i32>,
    pins: Vec<PinInfo>,
    diagnostics: Vec<String>,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let mut link = HostLink::connect(&args.path, timeout)?;

    // The board announces itself on connect.
    let version = link.expect("protocol version", timeout, |m| {
        !m.is_sysex() && m.command() == REPORT_VERSION
    })?;
    let firmware = link.expect("firmware report", timeout, |m| {
        m.is_sysex() && m.command() == REPORT_FIRMWARE
    })?;

    link.send(&Message::sysex(CAPABILITY_QUERY, Vec::new()))?;
    let caps = link.expect("capability response", timeout, |m| {
        m.is_sysex() && m.command() == CAPABILITY_RESPONSE
    })?;

    let max_sysex_size = read_variable(&mut link, SYSVAR_MAX_SYSEX, timeout)?;
    let receive_buffer_size = read_variable(&mut link, SYSVAR_RECEIVE_BUFFER, timeout)?;

    let out = BoardInfoOutput {
        schema_id: schema_id("board-info"),
        protocol_version: version_string(version.args())?,
        firmware: parse_firmware(firmware.args())?,
        max_sysex_size,
        receive_buffer_size,
        pins: parse_capabilities(caps.args()),
        diagnostics: link.diagnostics().to_vec(),
    };

    print_board_info(&out, format);
    Ok(SUCCESS)
}

fn read_variable(link: &mut HostLink, id: u16, timeout: Duration) -> CliResult<Option<i32>> {
    link.send(&Message::sysex(
        SYSTEM_VARIABLE,
        SystemVariable::query(id, 0).encode(),
    ))?;
    let reply = link.expect("system variable", timeout, |m| {
        m.is_sysex()
            && m.command() == SYSTEM_VARIABLE
            && SystemVariable::decode(m.args()).is_ok_and(|v| v.id == id)
    })?;
    let var = SystemVariable::decode(reply.args())
        .map_err(|err| CliError::new(DATA_INVALID, format!("system variable {id}: {err}")))?;
    Ok((var.status == SystemVariableStatus::NoError).then_some(var.value))
}

fn version_string(data: &[u8]) -> CliResult<String> {
    match data {
        [major, minor] => Ok(format!("{major}.{minor}")),
        _ => Err(CliError::new(
            DATA_INVALID,
            format!("protocol version reply has {} data bytes", data.len()),
        )),
    }
}

fn parse_firmware(args: &[u8]) -> CliResult<FirmwareInfo> {
    match args {
        [major, minor, name @ ..] => Ok(FirmwareInfo {
            name: decode_string_data(name),
            version: format!("{major}.{minor}"),
        }),
        _ => Err(CliError::new(DATA_INVALID, "firmware report is truncated")),
    }
}

/// Split a CAPABILITY_RESPONSE body into per-pin (mode, resolution) lists.
fn parse_capabilities(args: &[u8]) -> Vec<PinInfo> {
    let mut pins = Vec::new();
    let mut modes = Vec::new();
    let mut rest = args;
    while let Some((&first, tail)) = rest.split_first() {
        if first == CAPABILITY_PIN_END {
            pins.push(PinInfo {
                pin: pins.len() as u8,
                modes: std::mem::take(&mut modes),
            });
            rest = tail;
            continue;
        }
        let Some((&resolution, tail)) = tail.split_first() else {
            break;
        };
        let mode = PinMode::from_code(first);
        modes.push(ModeInfo {
            mode: mode.name(),
            code: mode.code(),
            resolution,
        });
        rest = tail;
    }
    pins
}

fn modes_summary(pin: &PinInfo) -> String {
    if pin.modes.is_empty() {
        return "(ignored)".to_string();
    }
    pin.modes
        .iter()
        .map(|m| format!("{}/{}", m.mode, m.resolution))
        .collect::<Vec<_>>()
        .join(", ")
}

fn optional(value: Option<i32>) -> String {
    value.map_or_else(|| "unavailable".to_string(), |v| v.to_string())
}

fn print_board_info(out: &BoardInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!(
                "{} {} (protocol {})",
                out.firmware.name, out.firmware.version, out.protocol_version
            );
            let mut pins = table(vec!["PIN", "MODES"]);
            for pin in &out.pins {
                pins.add_row(vec![pin.pin.to_string(), modes_summary(pin)]);
            }
            println!("{pins}");
        }
        OutputFormat::Pretty => {
            println!("Board Info:");
            println!("  Firmware:        {} {}", out.firmware.name, out.firmware.version);
            println!("  Protocol:        {}", out.protocol_version);
            println!("  Max sysex:       {}", optional(out.max_sysex_size));
            println!("  Receive buffer:  {}", optional(out.receive_buffer_size));
            println!("  Pins:");
            for pin in &out.pins {
                println!("    {:>3}  {}", pin.pin, modes_summary(pin));
            }
            for diagnostic in &out.diagnostics {
                println!("  Diagnostic:      {diagnostic}");
            }
        }
        OutputFormat::Raw => println!("{}", out.firmware.name),
    }
}
