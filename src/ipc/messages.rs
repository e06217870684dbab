//! IPC message types.
//!
//! Requests are a closed tagged-variant set: unknown message kinds fail to
//! deserialize and are answered with an error rather than routed dynamically.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::KeyValidation;
use crate::domain::{Settings, WarSession};

/// Request sent from a UI client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Read the full observable state.
    GetState,
    /// Probe an API key; persist it on success when `persist` is set.
    ValidateApiKey {
        api_key: String,
        #[serde(default)]
        persist: bool,
    },
    /// Run war detection and a poll cycle immediately.
    ForceRefresh,
    /// Merge a settings patch. Unknown keys are dropped server-side.
    UpdateSettings { settings: Value },
    /// Clear all persisted state and start over.
    ResetData,
    /// Receive push events on this connection after the response.
    Subscribe,
}

/// Response to a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    State {
        settings: Settings,
        war: WarSession,
        has_api_key: bool,
    },
    KeyValidation {
        #[serde(flatten)]
        result: KeyValidation,
    },
    Settings {
        settings: Settings,
    },
    Ok,
    Error {
        message: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Push event broadcast to subscribed clients. Fire-and-forget: delivery to
/// zero listeners is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    WarDataUpdated,
    SettingsUpdated,
}
