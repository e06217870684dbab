//! Injectable time source.
//!
//! Every component that reasons about staleness or the rate window takes a
//! `Clock` so tests can drive time deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time source abstraction.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the unix epoch.
    fn now_ms(&self) -> u64;

    /// Current time in whole unix seconds.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// Wall-clock time source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given millisecond timestamp.
    pub fn at_ms(ms: u64) -> Arc<Self> {
        Arc::new(Self { ms: AtomicU64::new(ms) })
    }

    /// Create a clock frozen at the given unix-seconds timestamp.
    pub fn at_secs(secs: u64) -> Arc<Self> {
        Self::at_ms(secs * 1000)
    }

    /// Advance the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute millisecond timestamp.
    pub fn set_ms(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}
