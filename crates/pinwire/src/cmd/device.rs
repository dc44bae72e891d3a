use std::time::Duration;

use pinwire_codec::command::{DEVICE_QUERY, DEVICE_RESPONSE};
use pinwire_codec::Message;
use pinwire_device::{DeviceAction, DeviceHandle, DeviceRequest, DeviceResponse};
use serde::Serialize;

use crate::cmd::{parse_timeout, DeviceArgs};
use crate::exit::{CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS};
use crate::link::HostLink;
use crate::output::{hex_bytes, parse_hex, print_json, schema_id, table, OutputFormat};

/// Largest parameter block the host decodes from a response.
const MAX_RESPONSE_BLOCK: usize = 1024;

/// One register operation inside an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Status { register: u16, count: u16 },
    Read { register: u16, count: u16 },
    Write { register: u16, data: Vec<u8> },
    Control { register: u16, data: Vec<u8> },
}

impl DeviceOp {
    fn request(&self, handle: DeviceHandle) -> DeviceRequest {
        match self {
            DeviceOp::Status { register, count } => {
                DeviceRequest::status(handle, *register, *count)
            }
            DeviceOp::Read { register, count } => DeviceRequest::read(handle, *register, *count),
            DeviceOp::Write { register, data } => DeviceRequest::write(handle, *register, data),
            DeviceOp::Control { register, data } => {
                DeviceRequest::control(handle, *register, data)
            }
        }
    }
}

/// Parse `ACTION:REG:ARG`. REG and COUNT accept decimal or `0x` hex.
pub fn parse_op(input: &str) -> Result<DeviceOp, String> {
    let mut parts = input.splitn(3, ':');
    let action = parts.next().unwrap_or_default();
    let (Some(register), Some(arg)) = (parts.next(), parts.next()) else {
        return Err(format!("expected ACTION:REG:ARG, got `{input}`"));
    };
    let register = parse_14bit(register)?;
    match action {
        "status" => Ok(DeviceOp::Status {
            register,
            count: parse_14bit(arg)?,
        }),
        "read" => Ok(DeviceOp::Read {
            register,
            count: parse_14bit(arg)?,
        }),
        "write" => Ok(DeviceOp::Write {
            register,
            data: parse_hex(arg).map_err(|err| format!("invalid hex `{arg}`: {err}"))?,
        }),
        "control" => Ok(DeviceOp::Control {
            register,
            data: parse_hex(arg).map_err(|err| format!("invalid hex `{arg}`: {err}"))?,
        }),
        other => Err(format!(
            "unknown action `{other}` (expected status, read, write or control)"
        )),
    }
}

fn parse_14bit(input: &str) -> Result<u16, String> {
    let value = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse::<u16>(),
    }
    .map_err(|_| format!("invalid number `{input}`"))?;
    if value > pinwire_codec::MAX_14BIT {
        return Err(format!("`{input}` does not fit in 14 bits"));
    }
    Ok(value)
}

#[derive(Serialize)]
struct OpResult {
    action: &'static str,
    register: u16,
    status: i32,
    status_name: &'static str,
    data: String,
}

impl From<&DeviceResponse> for OpResult {
    fn from(resp: &DeviceResponse) -> Self {
        Self {
            action: resp.action.name(),
            register: resp.register,
            status: resp.status.value(),
            status_name: resp.status.name(),
            data: hex_bytes(&resp.data),
        }
    }
}

#[derive(Serialize)]
struct DeviceSessionOutput {
    schema_id: String,
    identity: String,
    handle: Option<String>,
    results: Vec<OpResult>,
    diagnostics: Vec<String>,
}

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let mut link = HostLink::connect(&args.path, timeout)?;

    let mut results = Vec::new();
    let mut failed = false;

    let opened = transact(&mut link, &DeviceRequest::open(&args.identity, args.flags), timeout)?;
    let handle = (!opened.status.is_error()).then_some(opened.handle);
    failed |= opened.status.is_error();
    results.push(OpResult::from(&opened));

    if let Some(handle) = handle {
        for op in &args.ops {
            let resp = transact(&mut link, &op.request(handle), timeout)?;
            failed |= resp.status.is_error();
            results.push(OpResult::from(&resp));
        }
        let closed = transact(&mut link, &DeviceRequest::close(handle), timeout)?;
        failed |= closed.status.is_error();
        results.push(OpResult::from(&closed));
    }

    let out = DeviceSessionOutput {
        schema_id: schema_id("device-session"),
        identity: args.identity,
        handle: handle.map(|h| h.to_string()),
        results,
        diagnostics: link.diagnostics().to_vec(),
    };
    print_session(&out, format);

    Ok(if failed { FAILURE } else { SUCCESS })
}

/// Send one request and wait for the response correlated with it.
fn transact(
    link: &mut HostLink,
    req: &DeviceRequest,
    timeout: Duration,
) -> CliResult<DeviceResponse> {
    link.send(&Message::sysex(DEVICE_QUERY, req.encode()))?;
    let reply = link.expect(req.action.name(), timeout, |m| {
        m.is_sysex()
            && m.command() == DEVICE_RESPONSE
            && DeviceResponse::decode(m.args(), MAX_RESPONSE_BLOCK)
                .is_ok_and(|resp| answers(req, &resp))
    })?;
    DeviceResponse::decode(reply.args(), MAX_RESPONSE_BLOCK)
        .map_err(|err| CliError::new(DATA_INVALID, format!("device response: {err}")))
}

fn answers(req: &DeviceRequest, resp: &DeviceResponse) -> bool {
    if resp.action != req.action {
        return false;
    }
    // Open replies carry the new handle; failures may come back on 0:0.
    req.action == DeviceAction::Open
        || resp.status.is_error()
        || (resp.handle == req.handle && resp.register == req.register)
}

fn print_session(out: &DeviceSessionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut results = table(vec!["ACTION", "REGISTER", "STATUS", "DATA"]);
            for r in &out.results {
                results.add_row(vec![
                    r.action.to_string(),
                    r.register.to_string(),
                    format!("{} ({})", r.status, r.status_name),
                    r.data.clone(),
                ]);
            }
            println!("{results}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} -> {}",
                out.identity,
                out.handle.as_deref().unwrap_or("(not opened)")
            );
            for r in &out.results {
                println!(
                    "  {:<8} reg={:<5} status={} ({}) data={}",
                    r.action, r.register, r.status, r.status_name, r.data
                );
            }
        }
        OutputFormat::Raw => {
            for r in &out.results {
                if r.action == "read" || r.action == "status" {
                    println!("{}", r.data);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pinwire_device::StatusCode;

    use super::*;

    #[test]
    fn ops_parse_in_all_forms() {
        assert_eq!(
            parse_op("read:0x10:2").unwrap(),
            DeviceOp::Read { register: 0x10, count: 2 }
        );
        assert_eq!(
            parse_op("write:2:abcd").unwrap(),
            DeviceOp::Write { register: 2, data: vec![0xAB, 0xCD] }
        );
        assert_eq!(
            parse_op("control:1:03").unwrap(),
            DeviceOp::Control { register: 1, data: vec![3] }
        );
        assert_eq!(
            parse_op("status:0:5").unwrap(),
            DeviceOp::Status { register: 0, count: 5 }
        );
    }

    #[test]
    fn bad_ops_are_rejected() {
        assert!(parse_op("read:0").is_err());
        assert!(parse_op("erase:0:1").is_err());
        assert!(parse_op("read:0x4000:1").is_err());
        assert!(parse_op("write:0:zz").is_err());
    }

    #[test]
    fn responses_correlate_by_action_handle_and_register() {
        let handle = DeviceHandle::new(1, 0x48);
        let req = DeviceRequest::read(handle, 4, 2);

        let same = DeviceResponse::new(DeviceAction::Read, handle, 4, StatusCode(2));
        assert!(answers(&req, &same));

        let other_register = DeviceResponse::new(DeviceAction::Read, handle, 0, StatusCode(2));
        assert!(!answers(&req, &other_register));

        let other_action = DeviceResponse::new(DeviceAction::Write, handle, 4, StatusCode(2));
        assert!(!answers(&req, &other_action));

        let failed = DeviceResponse::error(Some(DeviceAction::Read), StatusCode::BAD_HANDLE);
        assert!(answers(&req, &failed));
    }
}
