//! Line-delimited JSON transport over a Unix domain socket.
//!
//! Requests look like `{"command": [...], "request_id": N}`; responses echo
//! the id and carry `"error": "success"` on success. Event frames have no
//! matching id and are dropped while a response is awaited.
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when talking to the player.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The client was never connected, or has been closed.
    #[error("not connected to the player")]
    NotConnected,

    /// No socket exists at the configured path.
    #[error("player socket not found at {0} (is the player running with --input-ipc-server?)")]
    SocketNotFound(PathBuf),

    /// The player sent something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The player answered with an error status.
    #[error("player error: {message}")]
    Player { message: String },

    /// Reading from or writing to the socket failed.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-wide unique request id.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Serialize)]
struct Request<'a> {
    command: &'a [Value],
    request_id: u64,
}

#[derive(Deserialize)]
struct Frame {
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

struct Connection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

/// Serialized request/response channel to the player.
///
/// One lock is held across the whole write-then-read cycle, so concurrent
/// callers are strictly serialized and each sees only its own response.
pub struct IpcTransport {
    socket_path: PathBuf,
    read_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl IpcTransport {
    /// Default time to wait for a response line.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

    /// Creates an unconnected transport for the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Overrides the response read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dials the socket. Calling it again while connected does nothing.
    pub fn connect(&self) -> Result<(), PlayerError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }
        if !self.socket_path.exists() {
            return Err(PlayerError::SocketNotFound(self.socket_path.clone()));
        }

        let stream = UnixStream::connect(&self.socket_path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
                PlayerError::SocketNotFound(self.socket_path.clone())
            }
            _ => PlayerError::Transport(err),
        })?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(PlayerError::Transport)?;
        let writer = stream.try_clone().map_err(PlayerError::Transport)?;

        *guard = Some(Connection {
            reader: BufReader::new(stream),
            writer,
        });
        info!(socket = %self.socket_path.display(), "connected to player");
        Ok(())
    }

    /// Drops the connection. Safe to call any number of times.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            info!(socket = %self.socket_path.display(), "closed player connection");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Sends one command and waits for the response carrying its id.
    ///
    /// Event frames, malformed lines and responses to other ids are
    /// discarded. End of stream closes the connection.
    pub fn send_command(&self, command: &[Value]) -> Result<Value, PlayerError> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(PlayerError::NotConnected)?;

        let request_id = next_request_id();
        let mut line = serde_json::to_string(&Request {
            command,
            request_id,
        })
        .map_err(|e| PlayerError::Protocol(e.to_string()))?;
        line.push('\n');

        if let Err(err) = conn
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| conn.writer.flush())
        {
            if err.kind() == io::ErrorKind::BrokenPipe {
                *guard = None;
            }
            return Err(PlayerError::Transport(err));
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = match conn.reader.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(err) => return Err(PlayerError::Transport(err)),
            };
            if read == 0 {
                *guard = None;
                return Err(PlayerError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "player closed the connection",
                )));
            }

            let frame: Frame = match serde_json::from_slice(buf.trim_ascii_end()) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!("dropping malformed frame: {err}");
                    continue;
                }
            };
            if frame.request_id != Some(request_id) {
                continue;
            }

            return match frame.error.as_deref() {
                Some("success") => Ok(frame.data.unwrap_or(Value::Null)),
                Some(message) => Err(PlayerError::Player {
                    message: message.to_string(),
                }),
                None => Err(PlayerError::Protocol(format!(
                    "response {request_id} has no error field"
                ))),
            };
        }
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) {
        self.close();
    }
}
