//! IPC client for the CLI and panel bridge to reach the daemon.
//!
//! The protocol is JSON Lines with in-order responses, so a connection
//! carries one request at a time. After `subscribe` the same stream also
//! delivers event notifications interleaved with responses.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{Result, WarwatchError};
use crate::ipc::messages::{Event, Request, Response};

/// Configuration for IPC client.
#[derive(Debug, Clone)]
pub struct IpcClientConfig {
    /// Path to daemon Unix socket.
    pub socket_path: PathBuf,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for IpcClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/warwatch-daemon.sock"),
            request_timeout_ms: 30000,
        }
    }
}

impl IpcClientConfig {
    /// Create config with custom socket path.
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Default::default()
        }
    }
}

/// Connected IPC client.
pub struct IpcClient {
    config: IpcClientConfig,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    subscribed: bool,
}

impl IpcClient {
    /// Connect to the daemon socket.
    pub async fn connect(config: IpcClientConfig) -> Result<Self> {
        let stream = UnixStream::connect(&config.socket_path)
            .await
            .map_err(|e| WarwatchError::Ipc(format!("Failed to connect: {}", e)))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            config,
            reader: BufReader::new(reader),
            writer,
            subscribed: false,
        })
    }

    /// Connect with a custom socket path.
    pub async fn connect_to(path: impl Into<PathBuf>) -> Result<Self> {
        Self::connect(IpcClientConfig::with_socket(path)).await
    }

    /// Get socket path.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Send a request and wait for its response. Events arriving before the
    /// response are discarded unless the client is subscribed, in which case
    /// they are skipped here and re-delivered by `recv_event`.
    pub async fn request(&mut self, request: Request) -> Result<Response> {
        let json = serde_json::to_string(&request)?;
        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| WarwatchError::Ipc(format!("Failed to write: {}", e)))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| WarwatchError::Ipc(format!("Failed to write: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| WarwatchError::Ipc(format!("Failed to flush: {}", e)))?;

        let timeout = tokio::time::Duration::from_millis(self.config.request_timeout_ms);
        tokio::time::timeout(timeout, self.read_response())
            .await
            .map_err(|_| WarwatchError::Ipc("Request timeout".into()))?
    }

    async fn read_response(&mut self) -> Result<Response> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| WarwatchError::Ipc(format!("Failed to read: {}", e)))?;
            if n == 0 {
                return Err(WarwatchError::Ipc("Connection closed".into()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || serde_json::from_str::<Event>(trimmed).is_ok() {
                // Interleaved event, not the response we are waiting for.
                continue;
            }
            return serde_json::from_str::<Response>(trimmed)
                .map_err(|e| WarwatchError::Ipc(format!("Bad response: {}", e)));
        }
    }

    /// Register for event notifications on this connection.
    pub async fn subscribe(&mut self) -> Result<()> {
        match self.request(Request::Subscribe).await? {
            Response::Ok => {
                self.subscribed = true;
                Ok(())
            }
            Response::Error { message } => Err(WarwatchError::Ipc(message)),
            other => Err(WarwatchError::Ipc(format!("Unexpected response: {:?}", other))),
        }
    }

    /// Wait for the next event. Requires a prior `subscribe`.
    pub async fn recv_event(&mut self) -> Result<Event> {
        if !self.subscribed {
            return Err(WarwatchError::Ipc("Not subscribed".into()));
        }
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| WarwatchError::Ipc(format!("Failed to read: {}", e)))?;
            if n == 0 {
                return Err(WarwatchError::Ipc("Connection closed".into()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(event) = serde_json::from_str::<Event>(trimmed) {
                return Ok(event);
            }
            // Non-event traffic on a subscribed stream is ignored.
        }
    }
}
