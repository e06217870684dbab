//! Tracked roster members.
//!
//! A `Target` is one enemy faction member whose live status is polled. Fields
//! merge on each successful poll so attributes the upstream payload omits
//! persist from the previous snapshot.

use serde::{Deserialize, Serialize};

/// Upstream status of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetStatus {
    Okay,
    Hospital,
    Traveling,
    Abroad,
    Jail,
    Federal,
    #[default]
    Unknown,
}

impl TargetStatus {
    /// Parse the upstream `status.state` string. Anything unrecognized maps
    /// to `Unknown` rather than failing the whole profile.
    pub fn parse(state: &str) -> Self {
        match state {
            "Okay" => Self::Okay,
            "Hospital" => Self::Hospital,
            "Traveling" => Self::Traveling,
            "Abroad" => Self::Abroad,
            "Jail" => Self::Jail,
            "Federal" => Self::Federal,
            _ => Self::Unknown,
        }
    }
}

/// One polled roster member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub id: u64,
    pub name: String,
    pub status: TargetStatus,
    pub status_description: String,
    /// Unix seconds when hospital stay ends, 0 if not hospitalized.
    pub hospital_until: u64,
    pub travel_destination: Option<String>,
    /// Seconds of travel remaining, 0 if not traveling.
    pub travel_time_left: u64,
    /// Human-readable relative-time string from the source API.
    pub last_action: String,
    /// Seconds since last action, derived from `last_action` at
    /// normalization time. `None` means unknown and sorts as maximal.
    pub last_action_seconds: Option<u64>,
    pub life_current: u64,
    pub life_max: u64,
    /// Unix seconds of the last fetch attempt, 0 if never polled.
    pub last_polled: u64,
    /// Message from the most recent failed fetch, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Unknown".to_string(),
            status: TargetStatus::Unknown,
            status_description: String::new(),
            hospital_until: 0,
            travel_destination: None,
            travel_time_left: 0,
            last_action: "Unknown".to_string(),
            last_action_seconds: None,
            life_current: 0,
            life_max: 0,
            last_polled: 0,
            error: None,
        }
    }
}

impl Target {
    /// Placeholder target for a roster member that has never been polled.
    pub fn unknown(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Seconds until hospital release, clamped to zero.
    pub fn hospital_remaining(&self, now: u64) -> u64 {
        self.hospital_until.saturating_sub(now)
    }

    /// Whether this target has ever completed a fetch attempt.
    pub fn never_polled(&self) -> bool {
        self.last_polled == 0
    }
}

/// Parse an upstream relative-time string ("17 minutes ago", "Online now")
/// into seconds since last action. Returns `None` when the string carries no
/// usable duration.
pub fn parse_relative_last_action(relative: &str) -> Option<u64> {
    let lower = relative.to_lowercase();
    if lower.contains("online") {
        return Some(0);
    }

    let mut tokens = lower.split_whitespace();
    while let Some(token) = tokens.next() {
        let Ok(n) = token.parse::<u64>() else { continue };
        let Some(unit) = tokens.next() else { return None };
        return if unit.starts_with("second") {
            Some(n)
        } else if unit.starts_with("minute") {
            Some(n * 60)
        } else if unit.starts_with("hour") {
            Some(n * 3600)
        } else if unit.starts_with("day") {
            Some(n * 86_400)
        } else {
            None
        };
    }
    None
}
