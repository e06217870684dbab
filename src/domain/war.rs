//! War session state.
//!
//! Exactly one `WarSession` is live per process. War detection re-derives it
//! wholesale; the poll cycle mutates it incrementally between detections.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::target::Target;

/// Lifecycle status of the tracked war.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WarStatus {
    #[default]
    Idle,
    MissingKey,
    NoFaction,
    NoActiveWar,
    ActiveWar,
    Error,
}

/// Aggregate state for the current conflict.
///
/// Invariant: `targets` is non-empty only when `status == ActiveWar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarSession {
    pub status: WarStatus,
    pub own_faction_id: Option<u64>,
    pub own_faction_name: Option<String>,
    pub enemy_faction_id: Option<u64>,
    pub enemy_faction_name: Option<String>,
    /// Tracked roster keyed by target id.
    pub targets: HashMap<u64, Target>,
    /// Unix seconds of the last session mutation.
    pub last_updated: u64,
    /// Seconds until the next poll tick, for UI countdown rendering.
    pub poll_countdown_seconds: u64,
    /// True while the rate window is currently blocking requests.
    pub rate_limited: bool,
    /// Set only when `status == Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Default for WarSession {
    fn default() -> Self {
        Self {
            status: WarStatus::Idle,
            own_faction_id: None,
            own_faction_name: None,
            enemy_faction_id: None,
            enemy_faction_name: None,
            targets: HashMap::new(),
            last_updated: 0,
            poll_countdown_seconds: crate::domain::settings::DEFAULT_POLL_INTERVAL_SECS,
            rate_limited: false,
            error_message: None,
        }
    }
}

impl WarSession {
    /// Deserialize a persisted session, falling back to the default when the
    /// stored blob is missing or malformed.
    pub fn from_stored(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Whether the poll cycle has anything to do.
    pub fn is_active(&self) -> bool {
        self.status == WarStatus::ActiveWar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_session() {
        let session = WarSession::default();
        assert_eq!(session.status, WarStatus::Idle);
        assert!(session.targets.is_empty());
        assert!(!session.rate_limited);
        assert_eq!(session.poll_countdown_seconds, 30);
        assert!(!session.is_active());
    }

    #[test]
    fn test_from_stored_none() {
        assert_eq!(WarSession::from_stored(None), WarSession::default());
    }

    #[test]
    fn test_from_stored_malformed() {
        let value = json!("not an object");
        assert_eq!(WarSession::from_stored(Some(&value)), WarSession::default());
    }

    #[test]
    fn test_from_stored_partial() {
        let value = json!({"status": "active_war", "last_updated": 500});
        let session = WarSession::from_stored(Some(&value));
        assert_eq!(session.status, WarStatus::ActiveWar);
        assert_eq!(session.last_updated, 500);
        assert!(session.targets.is_empty());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(WarStatus::NoActiveWar).unwrap(),
            json!("no_active_war")
        );
        assert_eq!(
            serde_json::to_value(WarStatus::MissingKey).unwrap(),
            json!("missing_key")
        );
    }

    #[test]
    fn test_session_roundtrip_with_targets() {
        let mut session = WarSession {
            status: WarStatus::ActiveWar,
            enemy_faction_id: Some(777),
            enemy_faction_name: Some("Rivals".to_string()),
            ..Default::default()
        };
        session.targets.insert(1, Target::unknown(1, "One"));

        let json = serde_json::to_value(&session).unwrap();
        let back: WarSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
        assert!(back.is_active());
    }
}
