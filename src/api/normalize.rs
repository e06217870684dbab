//! Normalization of raw profile payloads into the canonical target shape.

use serde_json::Value;

use crate::domain::{Target, TargetStatus, parse_relative_last_action};

fn as_u64(value: Option<&Value>) -> u64 {
    value
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
        .unwrap_or(0)
}

fn as_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Map an upstream profile payload into a `Target`. Absent or malformed
/// fields degrade to the unknown defaults rather than failing; `last_polled`
/// is left for the caller to stamp with the cycle's `now`.
pub fn normalize_profile(id: u64, raw: &Value) -> Target {
    let status = raw.get("status");
    let travel = raw.get("travel");
    let life = raw.get("life");

    let state = as_str(status.and_then(|s| s.get("state")))
        .or_else(|| as_str(raw.get("status")))
        .unwrap_or("Unknown");
    let last_action = as_str(raw.pointer("/last_action/relative"))
        .or_else(|| as_str(raw.get("lastAction")))
        .unwrap_or("Unknown")
        .to_string();
    let last_action_seconds = parse_relative_last_action(&last_action);

    Target {
        id,
        name: as_str(raw.get("name")).unwrap_or("Unknown").to_string(),
        status: TargetStatus::parse(state),
        status_description: as_str(status.and_then(|s| s.get("description")))
            .unwrap_or("")
            .to_string(),
        hospital_until: as_u64(status.and_then(|s| s.get("until"))),
        travel_destination: as_str(travel.and_then(|t| t.get("destination"))).map(String::from),
        travel_time_left: as_u64(travel.and_then(|t| t.get("time_left"))),
        last_action,
        last_action_seconds,
        life_current: as_u64(life.and_then(|l| l.get("current"))),
        life_max: as_u64(life.and_then(|l| l.get("maximum"))),
        last_polled: 0,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_full_payload() {
        let raw = json!({
            "name": "Rival",
            "status": {"state": "Hospital", "description": "In hospital for 2 hrs", "until": 1_700_000_000u64},
            "travel": {"destination": "Switzerland", "time_left": 900},
            "life": {"current": 50, "maximum": 100},
            "last_action": {"relative": "5 minutes ago"}
        });
        let target = normalize_profile(42, &raw);
        assert_eq!(target.id, 42);
        assert_eq!(target.name, "Rival");
        assert_eq!(target.status, TargetStatus::Hospital);
        assert_eq!(target.status_description, "In hospital for 2 hrs");
        assert_eq!(target.hospital_until, 1_700_000_000);
        assert_eq!(target.travel_destination.as_deref(), Some("Switzerland"));
        assert_eq!(target.travel_time_left, 900);
        assert_eq!(target.last_action, "5 minutes ago");
        assert_eq!(target.last_action_seconds, Some(300));
        assert_eq!(target.life_current, 50);
        assert_eq!(target.life_max, 100);
        assert_eq!(target.last_polled, 0);
        assert!(target.error.is_none());
    }

    #[test]
    fn test_normalize_empty_payload() {
        let target = normalize_profile(7, &json!({}));
        assert_eq!(target.id, 7);
        assert_eq!(target.name, "Unknown");
        assert_eq!(target.status, TargetStatus::Unknown);
        assert_eq!(target.hospital_until, 0);
        assert!(target.travel_destination.is_none());
        assert_eq!(target.last_action, "Unknown");
        assert_eq!(target.last_action_seconds, None);
    }

    #[test]
    fn test_normalize_flat_status_string() {
        let target = normalize_profile(1, &json!({"status": "Okay"}));
        assert_eq!(target.status, TargetStatus::Okay);
    }

    #[test]
    fn test_normalize_numeric_strings() {
        let raw = json!({"status": {"state": "Hospital", "until": "1700000123"}});
        let target = normalize_profile(1, &raw);
        assert_eq!(target.hospital_until, 1_700_000_123);
    }

    #[test]
    fn test_normalize_online_last_action() {
        let raw = json!({"last_action": {"relative": "Online now"}});
        let target = normalize_profile(1, &raw);
        assert_eq!(target.last_action_seconds, Some(0));
    }
}
