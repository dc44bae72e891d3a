use pinwire_codec::CodecError;
use pinwire_registry::RegistryError;

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Framing or transport failure on the board stream.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Registry setup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    ConfigIo(#[source] std::io::Error),

    /// The configuration file is not valid JSON for [`crate::EngineConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The configuration parsed but is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Whether the host end of the stream went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            EngineError::Codec(CodecError::ConnectionClosed) => true,
            EngineError::Codec(CodecError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_and_reset_streams_are_disconnects() {
        assert!(EngineError::from(CodecError::ConnectionClosed).is_disconnect());
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(EngineError::from(CodecError::Io(reset)).is_disconnect());
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!EngineError::from(CodecError::Io(denied)).is_disconnect());
        assert!(!EngineError::InvalidConfig("x".to_string()).is_disconnect());
    }
}
