//! Millisecond time sources.
//!
//! Every sensor and timer event carries its own `at_ms` timestamp. Commands
//! issued directly on the session (prepare, add, finish) read the session's
//! [`TimeSource`] instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Hook for queue drivers: called with the timestamp of every envelope
    /// before it is dispatched. Wall-clock sources ignore it.
    fn observe(&self, _at_ms: u64) {}
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually advanced clock for replay and tests.
///
/// Clones share the same underlying counter. Time never goes backwards:
/// `observe` and `set` keep the maximum seen value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, at_ms: u64) {
        self.now.fetch_max(at_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn observe(&self, at_ms: u64) {
        self.set(at_ms);
    }
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn to_datetime(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_default()
}
