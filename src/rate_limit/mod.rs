//! Fixed-window rate limiting keyed by client identity and action.
//!
//! Each request increments the window counter first and then compares it with
//! the limit, so with a limit of `n` the `n`-th request passes and the `n+1`-th
//! is rejected. Rejected requests still count. Once `reset_at` passes, the next
//! request opens a fresh window with a count of one.

mod store;

pub use store::{MemoryRateLimitStore, RateLimitStore, WindowState};

use axum::http::HeaderMap;
use rand::Rng;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

/// Identity used when no client address header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

/// Limit applied to one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub action: String,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub fn new(action: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            action: action.into(),
            max_requests,
            window,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix milliseconds at which the current window ends.
    pub reset_at_ms: i64,
    /// Only set when the request was rejected.
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitResult {
    /// Window end in unix seconds, rounded up.
    #[must_use]
    pub fn reset_at_seconds(&self) -> i64 {
        self.reset_at_ms.saturating_add(999) / 1000
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    sweep_probability: f64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
        }
    }

    /// Probability in `[0, 1]` that a call also sweeps expired windows.
    #[must_use]
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn RateLimitStore {
        self.store.as_ref()
    }

    pub fn check(
        &self,
        client_id: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> RateLimitResult {
        self.check_at(client_id, action, max_attempts, window, now_unix_millis())
    }

    pub fn check_policy(&self, client_id: &str, policy: &RateLimitPolicy) -> RateLimitResult {
        self.check(client_id, &policy.action, policy.max_requests, policy.window)
    }

    pub fn check_at(
        &self,
        client_id: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
        now_ms: i64,
    ) -> RateLimitResult {
        self.maybe_sweep(now_ms);

        let key = format!("{client_id}:{action}");
        let state = self.store.hit(&key, window, now_ms);
        let allowed = state.count <= max_attempts;
        let retry_after_seconds = if allowed {
            None
        } else {
            let wait_ms = state.reset_at_ms.saturating_sub(now_ms).max(0);
            let seconds = u64::try_from(wait_ms).unwrap_or(0).div_ceil(1000);
            debug!(key = %key, count = state.count, "rate limit exceeded");
            Some(seconds.max(1))
        };

        RateLimitResult {
            allowed,
            limit: max_attempts,
            remaining: max_attempts.saturating_sub(state.count),
            reset_at_ms: state.reset_at_ms,
            retry_after_seconds,
        }
    }

    fn maybe_sweep(&self, now_ms: i64) {
        if self.sweep_probability <= 0.0 {
            return;
        }
        if rand::thread_rng().gen_bool(self.sweep_probability) {
            let removed = self.store.sweep(now_ms);
            if removed > 0 {
                debug!(removed, "swept expired rate limit windows");
            }
        }
    }
}

/// Derive the client identity from proxy headers.
///
/// Prefers the first `X-Forwarded-For` hop, then `X-Real-IP`, then `unknown`.
#[must_use]
pub fn client_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), str::to_string)
}

#[must_use]
pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
