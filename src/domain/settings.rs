//! Runtime settings persisted in the store.
//!
//! Settings merge as patch-over-stored-over-defaults. Unknown keys in a patch
//! are discarded so malformed client messages cannot pollute the snapshot,
//! and numeric fields are clamped to their allowed ranges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
/// Poll interval bounds; values snap to 30-second steps.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;
pub const MAX_POLL_INTERVAL_SECS: u64 = 120;

/// Visible-target bounds. UI-only: never affects the fetch budget.
pub const MIN_VISIBLE_TARGETS: u64 = 5;
pub const MAX_VISIBLE_TARGETS: u64 = 30;

/// User-tunable settings. Panel fields are persisted for UI clients but
/// never interpreted by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_seconds: u64,
    pub max_visible_targets: u64,
    pub panel_position: String,
    pub default_sort: String,
    pub show_last_action: bool,
    pub show_life_bar: bool,
    pub flash_on_okay: bool,
    pub sound_alerts: bool,
    pub panel_width: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
            max_visible_targets: 15,
            panel_position: "right".to_string(),
            default_sort: "all".to_string(),
            show_last_action: true,
            show_life_bar: true,
            flash_on_okay: true,
            sound_alerts: false,
            panel_width: 320,
        }
    }
}

/// Clamp with optional snapping to a step size.
fn clamp_int(value: i64, min: u64, max: u64, step: u64) -> u64 {
    let clamped = value.clamp(min as i64, max as i64) as u64;
    if step > 1 {
        (((clamped + step / 2) / step) * step).clamp(min, max)
    } else {
        clamped
    }
}

impl Settings {
    /// Deserialize a persisted settings blob, falling back to defaults per
    /// field, then clamp.
    pub fn from_stored(value: Option<&Value>) -> Self {
        let mut settings: Settings = value
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        settings.normalize();
        settings
    }

    /// Apply a patch object: known keys override, unknown keys are dropped,
    /// wrongly-typed values leave the current value in place.
    pub fn apply_patch(&self, patch: &Value) -> Self {
        let mut next = self.clone();
        let Some(map) = patch.as_object() else {
            return next;
        };

        if let Some(v) = map.get("poll_interval_seconds").and_then(Value::as_i64) {
            next.poll_interval_seconds = v.max(0) as u64;
        }
        if let Some(v) = map.get("max_visible_targets").and_then(Value::as_i64) {
            next.max_visible_targets = v.max(0) as u64;
        }
        if let Some(v) = map.get("panel_position").and_then(Value::as_str) {
            next.panel_position = v.to_string();
        }
        if let Some(v) = map.get("default_sort").and_then(Value::as_str) {
            next.default_sort = v.to_string();
        }
        if let Some(v) = map.get("show_last_action").and_then(Value::as_bool) {
            next.show_last_action = v;
        }
        if let Some(v) = map.get("show_life_bar").and_then(Value::as_bool) {
            next.show_life_bar = v;
        }
        if let Some(v) = map.get("flash_on_okay").and_then(Value::as_bool) {
            next.flash_on_okay = v;
        }
        if let Some(v) = map.get("sound_alerts").and_then(Value::as_bool) {
            next.sound_alerts = v;
        }
        if let Some(v) = map.get("panel_width").and_then(Value::as_i64) {
            next.panel_width = v.max(0) as u64;
        }

        next.normalize();
        next
    }

    /// Clamp all fields into their allowed ranges.
    pub fn normalize(&mut self) {
        self.poll_interval_seconds = clamp_int(
            self.poll_interval_seconds as i64,
            MIN_POLL_INTERVAL_SECS,
            MAX_POLL_INTERVAL_SECS,
            30,
        );
        self.max_visible_targets = clamp_int(
            self.max_visible_targets as i64,
            MIN_VISIBLE_TARGETS,
            MAX_VISIBLE_TARGETS,
            1,
        );
        self.panel_width = clamp_int(self.panel_width as i64, 280, 560, 1);
        if self.panel_position != "left" && self.panel_position != "right" {
            self.panel_position = "right".to_string();
        }
        const SORTS: [&str; 5] = ["all", "okay", "hospital", "traveling", "abroad"];
        if !SORTS.contains(&self.default_sort.as_str()) {
            self.default_sort = "all".to_string();
        }
    }
}
