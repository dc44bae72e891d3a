//! Host side of a board connection.

use std::path::Path;
use std::time::{Duration, Instant};

use pinwire_codec::command::STRING_DATA;
use pinwire_codec::{Message, MessageConfig, MessageReader, MessageWriter, Origin};
use pinwire_transport::{BoardSocket, BoardStream, TransportError};
use tracing::{debug, warn};

use crate::exit::{codec_error, transport_error, CliError, CliResult, TIMEOUT};

const CONNECT_RETRY: Duration = Duration::from_millis(50);
/// Largest board sysex the host accepts; matches the engine's default
/// outbound limit.
const MAX_BOARD_SYSEX: usize = 1024;

pub struct HostLink {
    reader: MessageReader<BoardStream>,
    writer: MessageWriter<BoardStream>,
    diagnostics: Vec<String>,
}

impl HostLink {
    /// Connect to a board socket, retrying while the socket is missing or
    /// refusing until `timeout` passes.
    pub fn connect(path: &Path, timeout: Duration) -> CliResult<Self> {
        let start = Instant::now();
        let stream = loop {
            match BoardSocket::connect(path) {
                Ok(stream) => break stream,
                Err(err) if is_retryable_connect_error(&err) => {
                    if start.elapsed() >= timeout {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("connect timed out after {timeout:?}"),
                        ));
                    }
                    std::thread::sleep(CONNECT_RETRY);
                }
                Err(err) => return Err(transport_error("connect failed", err)),
            }
        };
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: BoardStream) -> CliResult<Self> {
        let write_half = stream
            .try_clone()
            .map_err(|err| transport_error("stream clone failed", err))?;
        Ok(Self {
            reader: MessageReader::with_config(
                stream,
                MessageConfig {
                    max_sysex_size: MAX_BOARD_SYSEX,
                    origin: Origin::Board,
                },
            ),
            writer: MessageWriter::new(write_half),
            diagnostics: Vec::new(),
        })
    }

    pub fn send(&mut self, message: &Message) -> CliResult<()> {
        self.writer
            .write_message(message)
            .map_err(|err| codec_error("send failed", err))
    }

    /// Read until a message matching `want` arrives, skipping everything
    /// else. STRING_DATA diagnostics are kept for [`HostLink::diagnostics`].
    pub fn expect(
        &mut self,
        what: &str,
        timeout: Duration,
        mut want: impl FnMut(&Message) -> bool,
    ) -> CliResult<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("timed out after {timeout:?} waiting for {what}"),
                ));
            }
            let message = match self.reader.read_message_timeout(remaining) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "dropping malformed board output");
                    continue;
                }
                Err(err) => return Err(codec_error(&format!("waiting for {what}"), err)),
            };
            if want(&message) {
                return Ok(message);
            }
            if message.command() == STRING_DATA {
                if let Some(text) = message.as_string() {
                    debug!(diagnostic = %text, "board diagnostic");
                    self.diagnostics.push(text);
                }
                continue;
            }
            debug!(command = message.command(), "skipping unrelated message");
        }
    }

    /// Diagnostics the board sent while waiting for replies.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

fn is_retryable_connect_error(err: &TransportError) -> bool {
    match err {
        TransportError::Connect { source, .. } => matches!(
            source.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_or_refused_sockets_are_retried() {
        let missing = TransportError::Connect {
            path: "/tmp/none.sock".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(is_retryable_connect_error(&missing));

        let denied = TransportError::Connect {
            path: "/tmp/none.sock".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!is_retryable_connect_error(&denied));
    }

    #[test]
    fn connect_to_missing_socket_times_out() {
        let path = std::env::temp_dir()
            .join(format!("pinwire-missing-{}.sock", std::process::id()));
        let err = match HostLink::connect(&path, Duration::from_millis(120)) {
            Ok(_) => panic!("connect should not succeed"),
            Err(err) => err,
        };
        assert_eq!(err.code, TIMEOUT);
    }
}
