use std::io::Read;

use bytes::BytesMut;
use pinwire_codec::command::{command_name, sysex_name};
use pinwire_codec::{decode_message_from, Message, Origin};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{hex_bytes, parse_hex, print_json, schema_id, table, OutputFormat};

#[derive(Serialize, Debug)]
struct DecodedMessage {
    kind: &'static str,
    command: u8,
    name: &'static str,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl From<&Message> for DecodedMessage {
    fn from(message: &Message) -> Self {
        let (kind, name) = if message.is_sysex() {
            ("sysex", sysex_name(message.command()))
        } else {
            ("fixed", command_name(message.command()))
        };
        Self {
            kind,
            command: message.command(),
            name,
            data: hex_bytes(message.args()),
            text: message.as_string(),
        }
    }
}

#[derive(Serialize, Debug)]
struct DecodeOutput {
    schema_id: String,
    origin: &'static str,
    messages: Vec<DecodedMessage>,
    errors: Vec<String>,
    incomplete_bytes: usize,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = if args.hex.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| io_error("reading stdin", err))?;
        text
    } else {
        args.hex.join(" ")
    };
    let bytes = parse_hex(&input)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))?;

    let out = decode_bytes(&bytes, args.max_sysex, args.from.into());
    print_decoded(&out, format);
    Ok(SUCCESS)
}

fn decode_bytes(bytes: &[u8], max_sysex: usize, origin: Origin) -> DecodeOutput {
    let mut buf = BytesMut::from(bytes);
    let mut messages = Vec::new();
    let mut errors = Vec::new();
    loop {
        match decode_message_from(&mut buf, max_sysex, origin) {
            Ok(Some(message)) => messages.push(DecodedMessage::from(&message)),
            Ok(None) => break,
            // every framing error consumes the bad input
            Err(err) => errors.push(err.to_string()),
        }
    }

    DecodeOutput {
        schema_id: schema_id("decoded-messages"),
        origin: match origin {
            Origin::Host => "host",
            Origin::Board => "board",
        },
        messages,
        errors,
        incomplete_bytes: buf.len(),
    }
}

fn print_decoded(out: &DecodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut messages = table(vec!["KIND", "COMMAND", "NAME", "DATA"]);
            for m in &out.messages {
                messages.add_row(vec![
                    m.kind.to_string(),
                    format!("0x{:02x}", m.command),
                    m.name.to_string(),
                    m.text.clone().unwrap_or_else(|| m.data.clone()),
                ]);
            }
            println!("{messages}");
            for err in &out.errors {
                println!("error: {err}");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for m in &out.messages {
                match &m.text {
                    Some(text) => println!("{} 0x{:02x} {} \"{text}\"", m.kind, m.command, m.name),
                    None => println!("{} 0x{:02x} {} [{}]", m.kind, m.command, m.name, m.data),
                }
            }
            for err in &out.errors {
                println!("error: {err}");
            }
            if out.incomplete_bytes > 0 {
                println!("incomplete: {} bytes", out.incomplete_bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_stream_decodes_in_order() {
        // SET_PIN_MODE 13 output, CAPABILITY_QUERY, start of a DIGITAL_MESSAGE
        let out = decode_bytes(
            &[0xF4, 0x0D, 0x01, 0xF0, 0x6B, 0xF7, 0x90, 0x01],
            256,
            Origin::Host,
        );
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].name, "SET_PIN_MODE");
        assert_eq!(out.messages[0].data, "0d 01");
        assert_eq!(out.messages[1].name, "CAPABILITY_QUERY");
        assert_eq!(out.incomplete_bytes, 2);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn version_reply_needs_board_origin() {
        let out = decode_bytes(&[0xF9, 0x02, 0x06], 256, Origin::Board);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].data, "02 06");

        let out = decode_bytes(&[0xF9, 0x02, 0x06], 256, Origin::Host);
        assert_eq!(out.messages[0].data, "-");
    }

    #[test]
    fn framing_errors_are_reported_and_skipped() {
        let out = decode_bytes(&[0xF0, 0x71, 0x01, 0xF4, 0x02, 0x01], 256, Origin::Host);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].name, "SET_PIN_MODE");
    }

    #[test]
    fn string_data_is_shown_as_text() {
        let out = decode_bytes(&[0xF0, 0x71, b'o', 0, b'k', 0, 0xF7], 256, Origin::Board);
        assert_eq!(out.messages[0].text.as_deref(), Some("ok"));
    }
}
