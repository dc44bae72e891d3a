use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::error::{CodecError, Result};
use crate::message::{decode_message_from, Message, MessageConfig};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally, callers always get complete messages.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: MessageConfig,
}

enum Fill {
    Data,
    Idle,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Return the next message if one can be assembled without waiting.
    ///
    /// Performs at most one read on the underlying stream. `WouldBlock` and
    /// `TimedOut` map to `Ok(None)`.
    pub fn poll_message(&mut self) -> Result<Option<Message>> {
        if let Some(message) = self.decode()? {
            return Ok(Some(message));
        }
        match self.fill()? {
            Fill::Data => self.decode(),
            Fill::Idle => Ok(None),
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Idle reads are retried, so streams with a read timeout behave as
    /// blocking streams here. Returns `Err(CodecError::ConnectionClosed)` when
    /// EOF is reached.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.poll_message()? {
                return Ok(message);
            }
        }
    }

    /// Read the next complete message, giving up after `timeout`.
    ///
    /// The deadline is checked between reads, so the stream should have a
    /// bounded read wait.
    pub fn read_message_timeout(&mut self, timeout: Duration) -> Result<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.poll_message()? {
                return Ok(Some(message));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn decode(&mut self) -> Result<Option<Message>> {
        decode_message_from(&mut self.buf, self.config.max_sysex_size, self.config.origin)
    }

    fn fill(&mut self) -> Result<Fill> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(Fill::Idle)
                }
                Err(err) => return Err(CodecError::Io(err)),
            };

            if read == 0 {
                return Err(CodecError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(Fill::Data);
        }
    }

    /// Number of buffered bytes not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the maximum sysex size for subsequent decoding.
    pub fn set_max_sysex_size(&mut self, max_sysex_size: usize) {
        self.config.max_sysex_size = max_sysex_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}
