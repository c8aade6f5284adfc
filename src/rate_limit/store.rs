//! Storage for fixed-window counters.

use dashmap::DashMap;
use std::time::Duration;

/// Counter state after a hit has been recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub reset_at_ms: i64,
}

/// Backing store for rate-limit windows.
///
/// `hit` must be atomic per key: deciding whether the window expired,
/// resetting or incrementing, and returning the new count happen as one step
/// so concurrent requests never lose an update.
pub trait RateLimitStore: Send + Sync {
    /// Record one attempt for `key` at `now_ms` and return the updated window.
    fn hit(&self, key: &str, window: Duration, now_ms: i64) -> WindowState;

    /// Drop windows that ended at or before `now_ms`. Returns how many were removed.
    fn sweep(&self, now_ms: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, WindowState>,
}

impl MemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

impl RateLimitStore for MemoryRateLimitStore {
    fn hit(&self, key: &str, window: Duration, now_ms: i64) -> WindowState {
        let fresh = WindowState {
            count: 1,
            reset_at_ms: now_ms.saturating_add(window_ms(window)),
        };
        // The entry guard holds the shard lock until it is dropped.
        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            reset_at_ms: fresh.reset_at_ms,
        });
        if entry.count == 0 || now_ms >= entry.reset_at_ms {
            *entry = fresh;
        } else {
            entry.count = entry.count.saturating_add(1);
        }
        *entry
    }

    fn sweep(&self, now_ms: i64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| state.reset_at_ms > now_ms);
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}
