use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// How long a read waits for host bytes before reporting `WouldBlock`.
///
/// The engine polls; a bounded wait lets it run periodic reporting even when
/// the host is silent.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

const STDIN_CHUNK_SIZE: usize = 1024;

/// A connected board stream: implements Read + Write.
///
/// Reads never block longer than [`POLL_INTERVAL`]; an idle stream yields
/// `ErrorKind::WouldBlock`. End of stream is a zero-length read.
pub struct BoardStream {
    inner: BoardStreamInner,
}

enum BoardStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Stdio(StdioStream),
}

impl Read for BoardStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.read(buf),
            BoardStreamInner::Stdio(stream) => stream.read(buf),
        }
    }
}

impl Write for BoardStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.write(buf),
            BoardStreamInner::Stdio(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => stream.flush(),
            BoardStreamInner::Stdio(stream) => stream.flush(),
        }
    }
}

impl BoardStream {
    /// Wrap a connected Unix domain socket and bound its read wait.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        Ok(Self {
            inner: BoardStreamInner::Unix(stream),
        })
    }

    /// Use the process's stdin/stdout as the board stream.
    ///
    /// Stdin is drained by a background thread so reads can time out.
    pub fn stdio() -> Self {
        Self {
            inner: BoardStreamInner::Stdio(StdioStream::spawn()),
        }
    }

    /// Clone the stream so reads and writes can be owned separately.
    ///
    /// Stdio clones share the stdin queue; only one of them should read.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            BoardStreamInner::Unix(stream) => BoardStreamInner::Unix(stream.try_clone()?),
            BoardStreamInner::Stdio(stream) => BoardStreamInner::Stdio(stream.share()),
        };
        Ok(Self { inner })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            BoardStreamInner::Unix(_) => "unix-domain-socket",
            BoardStreamInner::Stdio(_) => "stdio",
        }
    }
}

impl std::fmt::Debug for BoardStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

struct StdioStream {
    incoming: Arc<Mutex<Receiver<Vec<u8>>>>,
    pending: Vec<u8>,
    offset: usize,
    stdout: std::io::Stdout,
}

impl StdioStream {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut chunk = [0u8; STDIN_CHUNK_SIZE];
            loop {
                match stdin.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(chunk[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(error = %err, "stdin reader stopped");
                        break;
                    }
                }
            }
        });

        Self {
            incoming: Arc::new(Mutex::new(rx)),
            pending: Vec::new(),
            offset: 0,
            stdout: std::io::stdout(),
        }
    }

    fn share(&self) -> Self {
        Self {
            incoming: Arc::clone(&self.incoming),
            pending: Vec::new(),
            offset: 0,
            stdout: std::io::stdout(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.offset >= self.pending.len() {
            let incoming = self
                .incoming
                .lock()
                .map_err(|_| std::io::Error::other("stdin queue poisoned"))?;
            match incoming.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Err(RecvTimeoutError::Timeout) => return Err(ErrorKind::WouldBlock.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stdout.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stdout.lock().flush()
    }
}
