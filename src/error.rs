//! Error types for warwatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in warwatch
#[derive(Debug, Error)]
pub enum WarwatchError {
    /// Missing or rejected API credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or HTTP-level failure talking to the game API
    #[error("Transport error: {0}")]
    Transport(String),

    /// The game API accepted the request but reported a domain-level error
    #[error("API error: {0}")]
    Api(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IPC communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Malformed request or payload
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for warwatch operations
pub type Result<T> = std::result::Result<T, WarwatchError>;
