use pinwire_codec::CodecError;

use crate::status::StatusCode;

/// Errors decoding device query/response messages.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The fixed header is incomplete.
    #[error("device message header too short ({len} bytes, need 8)")]
    HeaderTooShort { len: usize },

    /// The action code is not one this protocol defines.
    #[error("unknown device action {0}")]
    UnknownAction(u8),

    /// The parameter block could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl DeviceError {
    /// Status reported to the host for a request that failed to decode.
    pub fn status(&self) -> StatusCode {
        match self {
            DeviceError::HeaderTooShort { .. } => StatusCode::MESSAGE_TOO_LARGE,
            DeviceError::UnknownAction(_) => StatusCode::NOT_SUPPORTED,
            DeviceError::Codec(CodecError::MessageTooLarge { .. }) => {
                StatusCode::MESSAGE_TOO_LARGE
            }
            DeviceError::Codec(CodecError::Allocation { .. }) => StatusCode::OUT_OF_MEMORY,
            DeviceError::Codec(_) => StatusCode::INVALID_ARGUMENT,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
