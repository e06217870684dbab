//! Unix socket server for panel-daemon communication.
//!
//! Speaks JSON Lines: one request per line in, one response per line out.
//! Clients that send `subscribe` additionally receive event notifications
//! pushed on the same stream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::error::{Result, WarwatchError};
use crate::ipc::messages::{Event, Request, Response};

/// Configuration for the IPC server
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Maximum number of concurrent clients
    pub max_clients: usize,
    /// Channel capacity for events
    pub event_channel_capacity: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/warwatch-daemon.sock"),
            max_clients: 16,
            event_channel_capacity: 256,
        }
    }
}

impl IpcServerConfig {
    /// Create config with custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }

    /// Set max clients
    pub fn with_max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }
}

/// Handler trait for processing requests
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    fn handle(&self, request: Request) -> impl std::future::Future<Output = Response> + Send;
}

/// Connected client state
#[derive(Debug)]
struct ClientState {
    /// Unique client ID (used for debugging/logging)
    #[allow(dead_code)]
    id: u64,
    /// Whether client is subscribed to events
    subscribed: bool,
}

/// IPC server for daemon communication
pub struct IpcServer {
    config: IpcServerConfig,
    /// Connected clients
    clients: Arc<RwLock<HashMap<u64, ClientState>>>,
    /// Event broadcaster
    event_tx: broadcast::Sender<Event>,
    /// Next client ID
    next_client_id: Arc<RwLock<u64>>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl IpcServer {
    pub fn new() -> Self {
        Self::with_config(IpcServerConfig::default())
    }

    pub fn with_config(config: IpcServerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            next_client_id: Arc::new(RwLock::new(1)),
            shutdown_tx: None,
        }
    }

    /// Use an externally owned event channel so the daemon can broadcast
    /// without holding the server.
    pub fn with_event_channel(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = event_tx;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast(&self, event: Event) -> Result<usize> {
        match self.event_tx.send(event) {
            Ok(count) => Ok(count),
            Err(_) => Ok(0), // No receivers
        }
    }

    /// Get count of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Run the server with a request handler
    pub async fn run<H: RequestHandler + 'static>(&mut self, handler: Arc<H>) -> Result<()> {
        // Remove existing socket if present
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }

        if let Some(parent) = self.config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)
            .map_err(|e| WarwatchError::Ipc(format!("Failed to bind socket: {}", e)))?;
        tracing::info!(path = %self.config.socket_path.display(), "IPC server listening");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let client_count = self.clients.read().await.len();
                            if client_count >= self.config.max_clients {
                                // Reject connection - at capacity
                                continue;
                            }

                            let client_id = {
                                let mut id = self.next_client_id.write().await;
                                let current = *id;
                                *id += 1;
                                current
                            };

                            {
                                let mut clients = self.clients.write().await;
                                clients.insert(client_id, ClientState {
                                    id: client_id,
                                    subscribed: false,
                                });
                            }

                            let handler_clone = Arc::clone(&handler);
                            let clients = Arc::clone(&self.clients);
                            let event_rx = self.event_tx.subscribe();

                            tokio::spawn(async move {
                                let _ = handle_client(
                                    stream,
                                    client_id,
                                    handler_clone,
                                    clients,
                                    event_rx,
                                ).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        // Cleanup socket
        let _ = std::fs::remove_file(&self.config.socket_path);
        Ok(())
    }

    /// Signal the server to shutdown
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(()).await;
        }
        Ok(())
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_line(writer: &mut (impl AsyncWriteExt + Unpin), payload: &str) -> bool {
    writer.write_all(payload.as_bytes()).await.is_ok() && writer.write_all(b"\n").await.is_ok()
}

/// Handle a single client connection
async fn handle_client<H: RequestHandler>(
    stream: UnixStream,
    client_id: u64,
    handler: Arc<H>,
    clients: Arc<RwLock<HashMap<u64, ClientState>>>,
    mut event_rx: broadcast::Receiver<Event>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        tokio::select! {
            // Handle incoming requests
            read_result = reader.read_line(&mut line) => {
                match read_result {
                    Ok(0) => break, // EOF - client disconnected
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            line.clear();
                            continue;
                        }

                        let response = match serde_json::from_str::<Request>(trimmed) {
                            Ok(Request::Subscribe) => {
                                let mut clients = clients.write().await;
                                if let Some(state) = clients.get_mut(&client_id) {
                                    state.subscribed = true;
                                }
                                Response::Ok
                            }
                            Ok(request) => handler.handle(request).await,
                            Err(e) => Response::error(format!("Parse error: {}", e)),
                        };
                        let response_json = serde_json::to_string(&response).unwrap_or_default();
                        if !write_line(&mut writer, &response_json).await {
                            break;
                        }
                        line.clear();
                    }
                    Err(_) => break,
                }
            }
            // Forward events to subscribed clients
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        let is_subscribed = {
                            let clients = clients.read().await;
                            clients.get(&client_id).is_some_and(|s| s.subscribed)
                        };
                        if is_subscribed {
                            let event_json = serde_json::to_string(&event).unwrap_or_default();
                            if !write_line(&mut writer, &event_json).await {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Client lagged behind, continue
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    // Remove client on disconnect
    {
        let mut clients = clients.write().await;
        clients.remove(&client_id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct StateHandler;

    impl RequestHandler for StateHandler {
        fn handle(&self, request: Request) -> impl std::future::Future<Output = Response> + Send {
            let response = match request {
                Request::ForceRefresh => Response::Ok,
                _ => Response::error("unsupported"),
            };
            async move { response }
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = IpcServerConfig::default();
        assert_eq!(config.max_clients, 16);
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_server_config_builder() {
        let config = IpcServerConfig::default()
            .with_socket_path("/tmp/test.sock")
            .with_max_clients(32);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/test.sock"));
        assert_eq!(config.max_clients, 32);
    }

    #[test]
    fn test_server_socket_path() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let config = IpcServerConfig::default().with_socket_path(&socket_path);
        let server = IpcServer::with_config(config);
        assert_eq!(server.socket_path(), socket_path);
    }

    #[tokio::test]
    async fn test_server_client_count_initial() {
        let server = IpcServer::new();
        assert_eq!(server.client_count().await, 0);
    }

    #[test]
    fn test_broadcast_no_receivers() {
        let server = IpcServer::new();
        let result = server.broadcast(Event::WarDataUpdated);
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_server_shutdown_before_run() {
        let server = IpcServer::new();
        assert!(server.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_request_response_over_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("warwatch.sock");
        let config = IpcServerConfig::default().with_socket_path(&socket_path);
        let mut server = IpcServer::with_config(config);

        tokio::spawn(async move {
            let _ = server.run(Arc::new(StateHandler)).await;
        });

        // Wait for the socket to appear.
        for _ in 0..100 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer.write_all(b"{\"type\":\"force_refresh\"}\n").await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: Response = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(response, Response::Ok));

        writer.write_all(b"not json\n").await.unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let response: Response = serde_json::from_str(line.trim()).unwrap();
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_subscribed_client_receives_events() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("warwatch.sock");
        let (event_tx, _keep) = broadcast::channel(16);
        let config = IpcServerConfig::default().with_socket_path(&socket_path);
        let mut server = IpcServer::with_config(config).with_event_channel(event_tx.clone());

        tokio::spawn(async move {
            let _ = server.run(Arc::new(StateHandler)).await;
        });
        for _ in 0..100 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer.write_all(b"{\"type\":\"subscribe\"}\n").await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(matches!(serde_json::from_str::<Response>(line.trim()).unwrap(), Response::Ok));

        event_tx.send(Event::WarDataUpdated).unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let event: Event = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(event, Event::WarDataUpdated);
    }
}
