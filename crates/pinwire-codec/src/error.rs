/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input span is shorter than the encoding requires.
    #[error("truncated encoding ({actual} bytes, need {needed})")]
    Length { needed: usize, actual: usize },

    /// A sysex body or decoded parameter block exceeds the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A data byte had its high bit set where only 7-bit values are allowed.
    #[error("byte 0x{byte:02x} at offset {offset} is not a 7-bit data byte")]
    NotSevenBit { byte: u8, offset: usize },

    /// A fixed-format command byte this codec does not know how to frame.
    #[error("unknown command byte 0x{0:02x}")]
    UnknownCommand(u8),

    /// A fixed-format message carries the wrong number of data bytes.
    #[error("command 0x{command:02x} takes {expected} data bytes, got {actual}")]
    DataLength {
        command: u8,
        expected: usize,
        actual: usize,
    },

    /// A sysex body was cut off by another command byte.
    #[error("sysex 0x{command:02x} interrupted by command byte 0x{interrupted_by:02x}")]
    Interrupted { command: u8, interrupted_by: u8 },

    /// A base64 parameter block could not be decoded.
    #[error("invalid opaque block: {0}")]
    InvalidOpaque(#[from] base64::DecodeError),

    /// The scratch buffer for a decoded block could not be allocated.
    #[error("allocation of {size} bytes failed")]
    Allocation { size: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

impl CodecError {
    /// Whether the stream may keep being read after this error.
    ///
    /// Protocol violations drop one message; I/O failures end the session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CodecError::Io(_) | CodecError::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
