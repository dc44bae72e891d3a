//! SYSTEM_VARIABLE get/set messages.
//!
//! Wire layout of the sysex arguments (both directions):
//!
//! ```text
//! ┌───────┬───────────┬────────┬──────────────┬─────┬──────────────────────┐
//! │ write │ data type │ status │ variable id  │ pin │ value                │
//! │ (1B)  │ (1B)      │ (1B)   │ (2×7 bits)   │(1B) │ (5B sign-magnitude)  │
//! └───────┴───────────┴────────┴──────────────┴─────┴──────────────────────┘
//! ```

use pinwire_codec::{decode14, decode32_signed, encode14, encode32_signed, CodecError};

/// Availability probe; always answers 1.
pub const SYSVAR_AVAILABLE: u16 = 0;
/// Largest sysex body the board accepts.
pub const SYSVAR_MAX_SYSEX: u16 = 1;
/// Size of the board's receive buffer.
pub const SYSVAR_RECEIVE_BUFFER: u16 = 2;

/// Encoded length of a system variable message.
pub const SYSVAR_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemVariableType {
    Undefined,
    Int,
    Float,
    Other(u8),
}

impl SystemVariableType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SystemVariableType::Undefined,
            1 => SystemVariableType::Int,
            2 => SystemVariableType::Float,
            other => SystemVariableType::Other(other & 0x7F),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SystemVariableType::Undefined => 0,
            SystemVariableType::Int => 1,
            SystemVariableType::Float => 2,
            SystemVariableType::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemVariableStatus {
    NoError,
    UnknownVariable,
    Error,
    ReadOnly,
    WriteOnly,
}

impl SystemVariableStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SystemVariableStatus::NoError,
            1 => SystemVariableStatus::UnknownVariable,
            3 => SystemVariableStatus::ReadOnly,
            4 => SystemVariableStatus::WriteOnly,
            _ => SystemVariableStatus::Error,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SystemVariableStatus::NoError => 0,
            SystemVariableStatus::UnknownVariable => 1,
            SystemVariableStatus::Error => 2,
            SystemVariableStatus::ReadOnly => 3,
            SystemVariableStatus::WriteOnly => 4,
        }
    }
}

/// A system variable query, updated in place by whoever answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemVariable {
    pub write: bool,
    pub data_type: SystemVariableType,
    pub status: SystemVariableStatus,
    pub id: u16,
    pub pin: u8,
    pub value: i32,
}

impl SystemVariable {
    /// A read request as a host would send it.
    pub fn query(id: u16, pin: u8) -> Self {
        Self {
            write: false,
            data_type: SystemVariableType::Undefined,
            status: SystemVariableStatus::UnknownVariable,
            id,
            pin,
            value: 0,
        }
    }

    /// Decode a request. The incoming status is irrelevant and reset to
    /// `UnknownVariable`, the reply when nobody answers.
    pub fn decode_request(args: &[u8]) -> Result<Self, CodecError> {
        let mut var = Self::decode(args)?;
        var.status = SystemVariableStatus::UnknownVariable;
        Ok(var)
    }

    pub fn decode(args: &[u8]) -> Result<Self, CodecError> {
        if args.len() < SYSVAR_LEN {
            return Err(CodecError::Length {
                needed: SYSVAR_LEN,
                actual: args.len(),
            });
        }
        Ok(Self {
            write: args[0] != 0,
            data_type: SystemVariableType::from_code(args[1]),
            status: SystemVariableStatus::from_code(args[2]),
            id: decode14(&args[3..5])?,
            pin: args[5],
            value: decode32_signed(&args[6..11])?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SYSVAR_LEN);
        out.push(u8::from(self.write));
        out.push(self.data_type.code());
        out.push(self.status.code());
        out.extend_from_slice(&encode14(self.id));
        out.push(self.pin & 0x7F);
        out.extend_from_slice(&encode32_signed(self.value));
        out
    }

    /// Answer with an integer value.
    pub fn answer_int(&mut self, value: i32) {
        self.value = value;
        self.data_type = SystemVariableType::Int;
        self.status = SystemVariableStatus::NoError;
    }

    /// Claim the query but report a failure status.
    pub fn reject(&mut self, status: SystemVariableStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let mut var = SystemVariable::query(300, 4);
        var.answer_int(-2);
        let bytes = var.encode();
        assert_eq!(
            bytes,
            vec![0x00, 0x01, 0x00, 0x2C, 0x02, 0x04, 0x02, 0x00, 0x00, 0x00, 0x08]
        );
        assert_eq!(SystemVariable::decode(&bytes).unwrap(), var);
    }

    #[test]
    fn request_status_is_reset() {
        let mut var = SystemVariable::query(9, 0);
        var.status = SystemVariableStatus::NoError;
        var.write = true;
        let decoded = SystemVariable::decode_request(&var.encode()).unwrap();
        assert_eq!(decoded.status, SystemVariableStatus::UnknownVariable);
        assert!(decoded.write);
    }

    #[test]
    fn short_message_rejected() {
        let err = SystemVariable::decode(&[0; 10]).unwrap_err();
        assert!(matches!(err, CodecError::Length { needed: 11, actual: 10 }));
    }

    #[test]
    fn unknown_type_code_is_echoed() {
        assert_eq!(SystemVariableType::from_code(9).code(), 9);
        assert_eq!(SystemVariableStatus::WriteOnly.code(), 4);
    }
}
