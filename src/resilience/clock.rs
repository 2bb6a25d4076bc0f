//! Wall-clock timestamps driven by the Tokio clock.
//!
//! Breaker timestamps are reported as unix milliseconds but compared using
//! Tokio's monotonic clock, so paused-time tests can move them with
//! `tokio::time::advance`.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Maps the Tokio monotonic clock onto unix milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    origin_unix_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_unix_ms: unix_millis(),
        }
    }

    /// Current time in unix milliseconds.
    pub fn now_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_unix_ms.saturating_add(elapsed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Current system time in unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
