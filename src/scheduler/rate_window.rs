//! Sliding-window request ledger.
//!
//! Tracks timestamps of issued requests within the trailing 60-second window
//! and answers whether another request may be issued against the per-minute
//! ceiling. The pure functions are the testable core; `RateWindow` is the
//! owned state threaded through the request queue instead of ambient globals.

/// Width of the rate window in milliseconds.
pub const RATE_WINDOW_MS: u64 = 60_000;

/// Drop every timestamp older than `now_ms - window_ms`, preserving order.
pub fn prune(timestamps: &[u64], now_ms: u64, window_ms: u64) -> Vec<u64> {
    let cutoff = now_ms.saturating_sub(window_ms);
    timestamps.iter().copied().filter(|t| *t >= cutoff).collect()
}

/// True iff another request fits under the ceiling right now.
pub fn can_admit(timestamps: &[u64], now_ms: u64, limit_per_window: usize) -> bool {
    prune(timestamps, now_ms, RATE_WINDOW_MS).len() < limit_per_window
}

/// Owned rate-window state: timestamps of issued requests, pruned before
/// each admission check. Constructed once at process start; a restart simply
/// forgets recent requests, which the rolling window tolerates.
#[derive(Debug, Clone)]
pub struct RateWindow {
    timestamps: Vec<u64>,
    limit_per_minute: usize,
}

impl RateWindow {
    /// Create a window enforcing `limit_per_minute` requests per minute.
    pub fn new(limit_per_minute: usize) -> Self {
        Self {
            timestamps: Vec::new(),
            limit_per_minute,
        }
    }

    /// Drop expired entries.
    pub fn prune(&mut self, now_ms: u64) {
        self.timestamps = prune(&self.timestamps, now_ms, RATE_WINDOW_MS);
    }

    /// Prune, then check admission.
    pub fn can_admit(&mut self, now_ms: u64) -> bool {
        self.prune(now_ms);
        can_admit(&self.timestamps, now_ms, self.limit_per_minute)
    }

    /// Record an issued request.
    pub fn record(&mut self, now_ms: u64) {
        self.timestamps.push(now_ms);
    }

    /// Number of requests currently inside the window.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit_per_minute
    }
}
