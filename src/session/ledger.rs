//! Refresh token ledger.
//!
//! Tokens are stateless, so single-use rotation needs one piece of server
//! state: the ids of refresh tokens that were already spent. An id is kept
//! until the token it belongs to would have expired anyway.

use dashmap::{mapref::entry::Entry, DashMap};

pub trait RefreshLedger: Send + Sync {
    /// Mark `jti` as spent. Returns `false` if it was already spent.
    ///
    /// Must be atomic: of several concurrent calls with the same `jti`,
    /// exactly one returns `true`.
    fn consume(&self, jti: &str, expires_at: i64) -> bool;

    fn is_consumed(&self, jti: &str) -> bool;

    /// Forget ids whose tokens expired at or before `now_unix_seconds`.
    fn sweep(&self, now_unix_seconds: i64) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryRefreshLedger {
    spent: DashMap<String, i64>,
}

impl MemoryRefreshLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

impl RefreshLedger for MemoryRefreshLedger {
    fn consume(&self, jti: &str, expires_at: i64) -> bool {
        match self.spent.entry(jti.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                true
            }
        }
    }

    fn is_consumed(&self, jti: &str) -> bool {
        self.spent.contains_key(jti)
    }

    fn sweep(&self, now_unix_seconds: i64) -> usize {
        let before = self.spent.len();
        self.spent.retain(|_, expires_at| *expires_at > now_unix_seconds);
        before.saturating_sub(self.spent.len())
    }
}
