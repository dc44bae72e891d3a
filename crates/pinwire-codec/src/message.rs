use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::command::{
    fixed_data_len_from, is_command, Origin, END_SYSEX, PROTOCOL_VERSION_MAJOR,
    PROTOCOL_VERSION_MINOR, REPORT_VERSION, SET_PIN_MODE, START_SYSEX, STRING_DATA,
    SYSTEM_RESET,
};
use crate::error::{CodecError, Result};
use crate::packing::{decode_string_data, encode_string_data};

/// Default maximum sysex body (command id + arguments) in bytes.
pub const DEFAULT_MAX_SYSEX: usize = 256;

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A fixed-format message: a command byte and up to two data bytes.
    Fixed { command: u8, data: Bytes },
    /// `START_SYSEX command args… END_SYSEX`, every byte after the start < 0x80.
    Sysex { command: u8, args: Bytes },
}

impl Message {
    /// Create a fixed-format message.
    pub fn fixed(command: u8, data: impl Into<Bytes>) -> Self {
        Message::Fixed {
            command,
            data: data.into(),
        }
    }

    /// Create a sysex message.
    pub fn sysex(command: u8, args: impl Into<Bytes>) -> Self {
        Message::Sysex {
            command,
            args: args.into(),
        }
    }

    /// A STRING_DATA sysex carrying `text`.
    pub fn string(text: &str) -> Self {
        let mut args = BytesMut::with_capacity(text.len() * 2);
        encode_string_data(text, &mut args);
        Message::sysex(STRING_DATA, args.freeze())
    }

    pub fn set_pin_mode(pin: u8, mode: u8) -> Self {
        Message::fixed(SET_PIN_MODE, vec![pin & 0x7F, mode & 0x7F])
    }

    pub fn report_version() -> Self {
        Message::fixed(REPORT_VERSION, Bytes::new())
    }

    /// The board's REPORT_VERSION reply.
    pub fn protocol_version() -> Self {
        Message::fixed(
            REPORT_VERSION,
            vec![PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR],
        )
    }

    pub fn system_reset() -> Self {
        Message::fixed(SYSTEM_RESET, Bytes::new())
    }

    /// Command byte (fixed) or sysex command id.
    pub fn command(&self) -> u8 {
        match self {
            Message::Fixed { command, .. } | Message::Sysex { command, .. } => *command,
        }
    }

    /// Data bytes (fixed) or sysex arguments.
    pub fn args(&self) -> &[u8] {
        match self {
            Message::Fixed { data, .. } => data,
            Message::Sysex { args, .. } => args,
        }
    }

    pub fn is_sysex(&self) -> bool {
        matches!(self, Message::Sysex { .. })
    }

    /// Text of a STRING_DATA sysex.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Message::Sysex { command, args } if *command == STRING_DATA => {
                Some(decode_string_data(args))
            }
            _ => None,
        }
    }

    /// The total wire size of this message.
    pub fn wire_size(&self) -> usize {
        match self {
            Message::Fixed { data, .. } => 1 + data.len(),
            Message::Sysex { args, .. } => 3 + args.len(),
        }
    }
}

/// Configuration for the message framer.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Maximum sysex body size (command id + arguments). Default: 256.
    pub max_sysex_size: usize,
    /// Sender of the messages being decoded. Default: the host.
    pub origin: Origin,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_sysex_size: DEFAULT_MAX_SYSEX,
            origin: Origin::Host,
        }
    }
}

fn check_seven_bit(bytes: &[u8], base_offset: usize) -> Result<()> {
    match bytes.iter().position(|&b| is_command(b)) {
        Some(offset) => Err(CodecError::NotSevenBit {
            byte: bytes[offset],
            offset: base_offset + offset,
        }),
        None => Ok(()),
    }
}

/// Encode a message into the wire format.
///
/// ```text
/// fixed:  [command ≥ 0x80] [data < 0x80]{0..2}
/// sysex:  0xF0 [command < 0x80] [args < 0x80]* 0xF7
/// ```
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    match message {
        Message::Fixed { command, data } => {
            let expected =
                fixed_data_len_from(*command, Origin::Host)
                    .ok_or(CodecError::UnknownCommand(*command))?;
            let reply = fixed_data_len_from(*command, Origin::Board);
            if data.len() != expected && Some(data.len()) != reply {
                return Err(CodecError::DataLength {
                    command: *command,
                    expected,
                    actual: data.len(),
                });
            }
            check_seven_bit(data, 1)?;
            dst.reserve(1 + data.len());
            dst.put_u8(*command);
            dst.put_slice(data);
        }
        Message::Sysex { command, args } => {
            check_seven_bit(&[*command], 1)?;
            check_seven_bit(args, 2)?;
            dst.reserve(3 + args.len());
            dst.put_u8(START_SYSEX);
            dst.put_u8(*command);
            dst.put_slice(args);
            dst.put_u8(END_SYSEX);
        }
    }
    Ok(())
}

/// Decode the next message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// Data bytes outside a message and unknown command bytes are skipped. A
/// message cut short by another command byte, or a sysex body longer than
/// `max_sysex`, is consumed and reported as an error; the next call resumes
/// with the following message.
pub fn decode_message(src: &mut BytesMut, max_sysex: usize) -> Result<Option<Message>> {
    decode_message_from(src, max_sysex, Origin::Host)
}

/// [`decode_message`] for messages sent by `origin`.
pub fn decode_message_from(
    src: &mut BytesMut,
    max_sysex: usize,
    origin: Origin,
) -> Result<Option<Message>> {
    loop {
        let Some(start) = src.iter().position(|&b| is_command(b)) else {
            if !src.is_empty() {
                debug!(skipped = src.len(), "dropping stray data bytes");
                src.clear();
            }
            return Ok(None); // Need more data
        };
        if start > 0 {
            debug!(skipped = start, "dropping stray data bytes");
            src.advance(start);
        }

        let command = src[0];
        if command == START_SYSEX {
            return decode_sysex(src, max_sysex);
        }

        let Some(len) = fixed_data_len_from(command, origin) else {
            debug!(command = format_args!("0x{command:02x}"), "skipping unframed command byte");
            src.advance(1);
            continue;
        };

        let available = src.len().min(1 + len);
        if let Some(pos) = src[1..available].iter().position(|&b| is_command(b)) {
            let interrupted_by = src[1 + pos];
            src.advance(1 + pos);
            return Err(CodecError::Interrupted {
                command,
                interrupted_by,
            });
        }
        if src.len() < 1 + len {
            return Ok(None); // Need more data
        }

        src.advance(1);
        let data = src.split_to(len).freeze();
        return Ok(Some(Message::Fixed { command, data }));
    }
}

fn decode_sysex(src: &mut BytesMut, max_sysex: usize) -> Result<Option<Message>> {
    let terminator = src[1..].iter().position(|&b| is_command(b)).map(|p| p + 1);

    let Some(end) = terminator else {
        let size = src.len() - 1;
        if size > max_sysex {
            // the tail still in flight is skipped as stray data
            src.clear();
            return Err(CodecError::MessageTooLarge {
                size,
                max: max_sysex,
            });
        }
        return Ok(None); // Need more data
    };

    let size = end - 1;
    let closing = src[end];
    let id = if size > 0 { src[1] } else { 0 };

    if closing != END_SYSEX {
        src.advance(end);
        return Err(CodecError::Interrupted {
            command: id,
            interrupted_by: closing,
        });
    }
    if size > max_sysex {
        src.advance(end + 1);
        return Err(CodecError::MessageTooLarge {
            size,
            max: max_sysex,
        });
    }
    if size == 0 {
        src.advance(end + 1);
        return Err(CodecError::Length {
            needed: 1,
            actual: 0,
        });
    }

    src.advance(2);
    let args = src.split_to(size - 1).freeze();
    src.advance(1);
    Ok(Some(Message::Sysex { command: id, args }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CAPABILITY_QUERY, DIGITAL_MESSAGE};

    fn decode_all(bytes: &[u8]) -> Vec<Result<Option<Message>>> {
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        loop {
            let before = buf.len();
            let result = decode_message(&mut buf, DEFAULT_MAX_SYSEX);
            let done = matches!(result, Ok(None));
            out.push(result);
            if done || buf.len() == before {
                break;
            }
        }
        out
    }

    #[test]
    fn encode_sysex() {
        let mut buf = BytesMut::new();
        encode_message(&Message::sysex(CAPABILITY_QUERY, Bytes::new()), &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xF0, 0x6B, 0xF7]);
    }

    #[test]
    fn encode_fixed() {
        let mut buf = BytesMut::new();
        encode_message(&Message::set_pin_mode(13, 1), &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xF4, 13, 1]);
    }

    #[test]
    fn encode_rejects_high_bit_argument() {
        let mut buf = BytesMut::new();
        let err = encode_message(&Message::sysex(0x30, vec![0x01, 0x80]), &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::NotSevenBit { byte: 0x80, offset: 3 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_wrong_fixed_length() {
        let mut buf = BytesMut::new();
        let err = encode_message(&Message::fixed(SET_PIN_MODE, vec![1]), &mut buf).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DataLength { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn decode_fixed_and_sysex() {
        let mut buf = BytesMut::from(&[0xF9, 0xF0, 0x6D, 0x05, 0xF7, 0x91, 0x01, 0x00][..]);

        let m1 = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().unwrap();
        assert_eq!(m1, Message::report_version());

        let m2 = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().unwrap();
        assert_eq!(m2, Message::sysex(0x6D, vec![0x05]));

        let m3 = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().unwrap();
        assert_eq!(m3, Message::fixed(DIGITAL_MESSAGE | 1, vec![0x01, 0x00]));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_returns_none() {
        let mut buf = BytesMut::from(&[0xF0, 0x30, 0x01][..]);
        assert!(decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        let mut buf = BytesMut::from(&[0xF4, 0x02][..]);
        assert!(decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn decode_skips_stray_data() {
        let mut buf = BytesMut::from(&[0x01, 0x02, 0x03, 0xFF][..]);
        let msg = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().unwrap();
        assert_eq!(msg, Message::system_reset());
    }

    #[test]
    fn decode_resynchronises_after_interrupted_sysex() {
        let results = decode_all(&[0xF0, 0x30, 0x01, 0x02, 0xF4, 0x0D, 0x01]);
        assert!(matches!(
            results[0],
            Err(CodecError::Interrupted { command: 0x30, interrupted_by: 0xF4 })
        ));
        assert_eq!(
            results[1].as_ref().unwrap().as_ref().unwrap(),
            &Message::set_pin_mode(13, 1)
        );
    }

    #[test]
    fn decode_drops_interrupted_fixed_message() {
        let results = decode_all(&[0xF4, 0x0D, 0xF9]);
        assert!(matches!(
            results[0],
            Err(CodecError::Interrupted { command: 0xF4, interrupted_by: 0xF9 })
        ));
        assert_eq!(
            results[1].as_ref().unwrap().as_ref().unwrap(),
            &Message::report_version()
        );
    }

    #[test]
    fn decode_rejects_oversized_sysex() {
        let mut wire = vec![0xF0, 0x71];
        wire.extend(std::iter::repeat(0x41).take(20));
        wire.push(0xF7);
        wire.push(0xF9);

        let mut buf = BytesMut::from(wire.as_slice());
        let err = decode_message(&mut buf, 8).unwrap_err();
        assert!(matches!(err, CodecError::MessageTooLarge { size: 21, max: 8 }));

        let next = decode_message(&mut buf, 8).unwrap().unwrap();
        assert_eq!(next, Message::report_version());
    }

    #[test]
    fn decode_rejects_unterminated_oversized_sysex() {
        let mut wire = vec![0xF0, 0x71];
        wire.extend(std::iter::repeat(0x41).take(20));
        let mut buf = BytesMut::from(wire.as_slice());

        let err = decode_message(&mut buf, 8).unwrap_err();
        assert!(matches!(err, CodecError::MessageTooLarge { .. }));
        assert!(buf.is_empty());

        // remaining body bytes and the terminator are skipped
        buf.extend_from_slice(&[0x41, 0x41, 0xF7, 0xFF]);
        let next = decode_message(&mut buf, 8).unwrap().unwrap();
        assert_eq!(next, Message::system_reset());
    }

    #[test]
    fn decode_empty_sysex_is_an_error() {
        let mut buf = BytesMut::from(&[0xF0, 0xF7][..]);
        let err = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap_err();
        assert!(matches!(err, CodecError::Length { needed: 1, actual: 0 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn version_reply_depends_on_origin() {
        let mut buf = BytesMut::new();
        encode_message(&Message::protocol_version(), &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xF9, 0x02, 0x06]);

        let msg = decode_message_from(&mut buf, DEFAULT_MAX_SYSEX, Origin::Board)
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::protocol_version());

        // from the host the same byte is a bare query
        let mut buf = BytesMut::from(&[0xF9][..]);
        let msg = decode_message(&mut buf, DEFAULT_MAX_SYSEX).unwrap().unwrap();
        assert_eq!(msg, Message::report_version());
    }

    #[test]
    fn string_message_roundtrip() {
        let msg = Message::string("Unknown pin mode");
        assert_eq!(msg.command(), STRING_DATA);
        assert_eq!(msg.as_string().unwrap(), "Unknown pin mode");
        assert_eq!(msg.wire_size(), 3 + 32);
    }
}
