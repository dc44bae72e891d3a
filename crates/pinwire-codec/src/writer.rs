use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{CodecError, Result};
use crate::message::{encode_message, Message, MessageConfig};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: MessageConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write one message, then flush.
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        self.encode(message)?;
        self.write_buffered()?;
        self.flush()
    }

    /// Encode and write a batch of messages with a single flush.
    ///
    /// Every message is encoded before anything is written, so an invalid
    /// message leaves the stream untouched.
    pub fn write_all(&mut self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        self.buf.clear();
        for message in messages {
            self.encode(message)?;
        }
        self.write_buffered()?;
        self.flush()
    }

    /// Write bytes that are already wire-encoded.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buffered()?;
        self.flush()
    }

    fn encode(&mut self, message: &Message) -> Result<()> {
        if let Message::Sysex { args, .. } = message {
            let size = args.len() + 1;
            if size > self.config.max_sysex_size {
                return Err(CodecError::MessageTooLarge {
                    size,
                    max: self.config.max_sysex_size,
                });
            }
        }
        encode_message(message, &mut self.buf)
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(CodecError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}
