//! Process-wide request-weight accounting.
//!
//! The venue budgets request weight per endpoint per minute. Every REST
//! request records its weight here so concurrent requests in one process
//! share a single view of how close they are to the limit.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct MinuteWindow {
    minute: i64,
    used: u64,
}

/// Per-endpoint per-minute weight tracker with thread-safe accumulation.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    windows: Mutex<HashMap<String, MinuteWindow>>,
}

impl RateLimitTracker {
    /// The process-wide tracker shared by every source instance.
    #[must_use]
    pub fn global() -> &'static Self {
        static TRACKER: OnceLock<RateLimitTracker> = OnceLock::new();
        TRACKER.get_or_init(RateLimitTracker::default)
    }

    /// Record spent weight against an endpoint; returns the total used in
    /// the current minute window.
    pub fn record(&self, endpoint: &str, weight: u64) -> u64 {
        self.record_at(endpoint, weight, Utc::now().timestamp() / 60)
    }

    /// Weight used by an endpoint in the current minute window.
    #[must_use]
    pub fn used(&self, endpoint: &str) -> u64 {
        let minute = Utc::now().timestamp() / 60;
        let windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows
            .get(endpoint)
            .filter(|w| w.minute == minute)
            .map_or(0, |w| w.used)
    }

    fn record_at(&self, endpoint: &str, weight: u64, minute: i64) -> u64 {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows
            .entry(endpoint.to_string())
            .or_insert(MinuteWindow { minute, used: 0 });
        if window.minute != minute {
            window.minute = minute;
            window.used = 0;
        }
        window.used += weight;
        debug!(endpoint, used = window.used, "request weight recorded");
        window.used
    }
}
