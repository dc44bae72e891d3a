//! Device query/response wire format.
//!
//! Both directions carry an 8-byte header of 7-bit values followed by an
//! optional base64 parameter block:
//!
//! ```text
//! ┌──────────────┬───────┬──────┬───────┬────────────┬─────────────────────┐
//! │ action|flags │ flags │ unit │ class │ register   │ count (request)     │
//! │ (1B)         │ (1B)  │ (1B) │ (1B)  │ (2×7 bits) │ status (response)   │
//! └──────────────┴───────┴──────┴───────┴────────────┴─────────────────────┘
//! ```
//!
//! The action sits in the low nibble of byte 0; bits 4-6 may carry Open
//! flags, ORed with byte 1. Response statuses are 14-bit sign-magnitude
//! with the sign in bit 13.

use pinwire_codec::{decode14, decode_opaque, encode14, encode_opaque, MAX_14BIT};

use crate::error::{DeviceError, Result};
use crate::handle::DeviceHandle;
use crate::status::StatusCode;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest status magnitude a response header can carry.
pub const MAX_STATUS_MAGNITUDE: i32 = 0x1FFF;

const STATUS_SIGN: u16 = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAction {
    Open,
    Status,
    Control,
    Read,
    Write,
    Close,
}

impl DeviceAction {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DeviceAction::Open),
            1 => Some(DeviceAction::Status),
            2 => Some(DeviceAction::Control),
            3 => Some(DeviceAction::Read),
            4 => Some(DeviceAction::Write),
            5 => Some(DeviceAction::Close),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DeviceAction::Open => 0,
            DeviceAction::Status => 1,
            DeviceAction::Control => 2,
            DeviceAction::Read => 3,
            DeviceAction::Write => 4,
            DeviceAction::Close => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceAction::Open => "open",
            DeviceAction::Status => "status",
            DeviceAction::Control => "control",
            DeviceAction::Read => "read",
            DeviceAction::Write => "write",
            DeviceAction::Close => "close",
        }
    }
}

/// Encode a status as 14-bit sign-magnitude; magnitudes saturate.
pub fn encode_status(status: StatusCode) -> [u8; 2] {
    let magnitude = status.value().unsigned_abs().min(MAX_STATUS_MAGNITUDE as u32) as u16;
    let mut raw = magnitude;
    if status.is_error() {
        raw |= STATUS_SIGN;
    }
    encode14(raw)
}

pub fn decode_status(src: &[u8]) -> Result<StatusCode> {
    let raw = decode14(src)?;
    let magnitude = i32::from(raw & !STATUS_SIGN);
    if raw & STATUS_SIGN != 0 {
        Ok(StatusCode(-magnitude))
    } else {
        Ok(StatusCode(magnitude))
    }
}

fn require_header(args: &[u8]) -> Result<()> {
    if args.len() < HEADER_LEN {
        return Err(DeviceError::HeaderTooShort { len: args.len() });
    }
    Ok(())
}

fn block_count(data: &[u8]) -> u16 {
    u16::try_from(data.len()).unwrap_or(MAX_14BIT).min(MAX_14BIT)
}

fn decode_handle(args: &[u8]) -> Result<DeviceHandle> {
    let raw = decode14(&args[2..4])?;
    // decode14 never yields more than 14 bits
    Ok(DeviceHandle::new((raw >> 7) as u8, (raw & 0x7F) as u8))
}

/// A host request inside a DEVICE_QUERY sysex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub action: DeviceAction,
    pub flags: u8,
    pub handle: DeviceHandle,
    pub register: u16,
    pub count: u16,
    /// Decoded parameter block.
    pub data: Vec<u8>,
}

impl DeviceRequest {
    fn new(action: DeviceAction, handle: DeviceHandle, register: u16, count: u16) -> Self {
        Self {
            action,
            flags: 0,
            handle,
            register,
            count,
            data: Vec::new(),
        }
    }

    pub fn open(identity: &str, flags: u8) -> Self {
        let mut req = Self::new(DeviceAction::Open, DeviceHandle::new(0, 0), 0, 0);
        req.flags = flags & 0x7F;
        req.data = identity.as_bytes().to_vec();
        req
    }

    pub fn status(handle: DeviceHandle, register: u16, count: u16) -> Self {
        Self::new(DeviceAction::Status, handle, register, count)
    }

    /// Control request; `count` is taken from the data length, saturating
    /// at 14 bits. A saturated count no longer matches the data and the
    /// board rejects it.
    pub fn control(handle: DeviceHandle, register: u16, data: &[u8]) -> Self {
        let mut req = Self::new(DeviceAction::Control, handle, register, block_count(data));
        req.data = data.to_vec();
        req
    }

    pub fn read(handle: DeviceHandle, register: u16, count: u16) -> Self {
        Self::new(DeviceAction::Read, handle, register, count)
    }

    /// Write request; `count` is taken from the data length, saturating at
    /// 14 bits like [`DeviceRequest::control`].
    pub fn write(handle: DeviceHandle, register: u16, data: &[u8]) -> Self {
        let mut req = Self::new(DeviceAction::Write, handle, register, block_count(data));
        req.data = data.to_vec();
        req
    }

    pub fn close(handle: DeviceHandle) -> Self {
        Self::new(DeviceAction::Close, handle, 0, 0)
    }

    /// Encode as DEVICE_QUERY sysex arguments.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 / 3 + 4);
        out.push(self.action.code());
        out.push(self.flags & 0x7F);
        out.extend_from_slice(&encode14(self.handle.raw()));
        out.extend_from_slice(&encode14(self.register));
        out.extend_from_slice(&encode14(self.count));
        out.extend_from_slice(encode_opaque(&self.data).as_bytes());
        out
    }

    /// Decode DEVICE_QUERY sysex arguments, rejecting parameter blocks longer
    /// than `max_block` decoded bytes before allocating them.
    pub fn decode(args: &[u8], max_block: usize) -> Result<Self> {
        require_header(args)?;
        let code = args[0] & 0x0F;
        let action = DeviceAction::from_code(code).ok_or(DeviceError::UnknownAction(code))?;
        let flags = ((args[0] >> 4) & 0x07) | (args[1] & 0x7F);
        let handle = decode_handle(args)?;
        let register = decode14(&args[4..6])?;
        let count = decode14(&args[6..8])?;
        let data = decode_opaque(&args[HEADER_LEN..], max_block)?;
        Ok(Self {
            action,
            flags,
            handle,
            register,
            count,
            data,
        })
    }
}

/// A board response inside a DEVICE_RESPONSE sysex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    pub action: DeviceAction,
    pub handle: DeviceHandle,
    pub register: u16,
    pub status: StatusCode,
    pub data: Vec<u8>,
}

impl DeviceResponse {
    pub fn new(
        action: DeviceAction,
        handle: DeviceHandle,
        register: u16,
        status: StatusCode,
    ) -> Self {
        Self {
            action,
            handle,
            register,
            status,
            data: Vec::new(),
        }
    }

    /// Response to a request that could not be decoded. Reported as a
    /// Close on handle 0:0 when the action itself is unknown.
    pub fn error(action: Option<DeviceAction>, status: StatusCode) -> Self {
        Self::new(
            action.unwrap_or(DeviceAction::Close),
            DeviceHandle::new(0, 0),
            0,
            status,
        )
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Encode as DEVICE_RESPONSE sysex arguments.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 / 3 + 4);
        out.push(self.action.code());
        out.push(0);
        out.extend_from_slice(&encode14(self.handle.raw()));
        out.extend_from_slice(&encode14(self.register));
        out.extend_from_slice(&encode_status(self.status));
        out.extend_from_slice(encode_opaque(&self.data).as_bytes());
        out
    }

    pub fn decode(args: &[u8], max_block: usize) -> Result<Self> {
        require_header(args)?;
        let code = args[0] & 0x0F;
        let action = DeviceAction::from_code(code).ok_or(DeviceError::UnknownAction(code))?;
        Ok(Self {
            action,
            handle: decode_handle(args)?,
            register: decode14(&args[4..6])?,
            status: decode_status(&args[6..8])?,
            data: decode_opaque(&args[HEADER_LEN..], max_block)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinwire_codec::CodecError;

    #[test]
    fn long_payload_count_saturates_at_14_bits() {
        let handle = DeviceHandle::new(0, 1);
        let data = vec![0u8; 20_000];

        let write = DeviceRequest::write(handle, 0, &data);
        assert_eq!(write.count, MAX_14BIT);
        let control = DeviceRequest::control(handle, 0, &data);
        assert_eq!(control.count, MAX_14BIT);

        let decoded = DeviceRequest::decode(&write.encode(), data.len()).unwrap();
        assert_eq!(decoded.count, MAX_14BIT);
        assert_ne!(usize::from(decoded.count), decoded.data.len());
    }

    #[test]
    fn request_layout() {
        let req = DeviceRequest::read(DeviceHandle::new(2, 0x48), 0x10, 2);
        assert_eq!(
            req.encode(),
            vec![0x03, 0x00, 0x48, 0x02, 0x10, 0x00, 0x02, 0x00]
        );
    }

    #[test]
    fn open_request_carries_identity() {
        let req = DeviceRequest::open("MCP9808:0", 1);
        let args = req.encode();
        assert_eq!(&args[..HEADER_LEN], &[0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&args[HEADER_LEN..], b"TUNQOTgwODow");
        assert_eq!(DeviceRequest::decode(&args, 128).unwrap(), req);
    }

    #[test]
    fn flags_nibble_is_merged() {
        let mut args = DeviceRequest::open("x", 0).encode();
        args[0] |= 0x05 << 4;
        args[1] = 0x08;
        let req = DeviceRequest::decode(&args, 128).unwrap();
        assert_eq!(req.action, DeviceAction::Open);
        assert_eq!(req.flags, 0x0D);
    }

    #[test]
    fn short_header_rejected() {
        let err = DeviceRequest::decode(&[0x03, 0x00, 0x01], 128).unwrap_err();
        assert!(matches!(err, DeviceError::HeaderTooShort { len: 3 }));
        assert_eq!(err.status(), StatusCode::MESSAGE_TOO_LARGE);
    }

    #[test]
    fn unknown_action_rejected() {
        let err = DeviceRequest::decode(&[0x09, 0, 0, 0, 0, 0, 0, 0], 128).unwrap_err();
        assert!(matches!(err, DeviceError::UnknownAction(9)));
        assert_eq!(err.status(), StatusCode::NOT_SUPPORTED);
    }

    #[test]
    fn oversized_block_rejected() {
        let req = DeviceRequest::write(DeviceHandle::new(0, 1), 0, &[0xAA; 200]);
        let err = DeviceRequest::decode(&req.encode(), 128).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Codec(CodecError::MessageTooLarge { size: 200, max: 128 })
        ));
        assert_eq!(err.status(), StatusCode::MESSAGE_TOO_LARGE);
    }

    #[test]
    fn status_sign_magnitude() {
        assert_eq!(encode_status(StatusCode(2)), [0x02, 0x00]);
        assert_eq!(encode_status(StatusCode::INVALID_ARGUMENT), [0x16, 0x40]);
        assert_eq!(decode_status(&[0x16, 0x40]).unwrap(), StatusCode::INVALID_ARGUMENT);
        assert_eq!(
            decode_status(&encode_status(StatusCode(100_000))).unwrap(),
            StatusCode(MAX_STATUS_MAGNITUDE)
        );
    }

    #[test]
    fn response_roundtrip_with_data() {
        let resp = DeviceResponse::new(
            DeviceAction::Read,
            DeviceHandle::new(1, 0x48),
            0,
            StatusCode(2),
        )
        .with_data(vec![0x01, 0xC0]);
        let decoded = DeviceResponse::decode(&resp.encode(), 128).unwrap();
        assert_eq!(decoded, resp);
    }
}
