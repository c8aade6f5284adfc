//! Shared fixtures for router-level tests.

use super::handlers::auth::{AuthConfig, AuthState};
use crate::{
    access::User,
    directory::{Credential, DirectoryError, DirectoryFuture, MemoryDirectory, UserDirectory},
    rate_limit::{MemoryRateLimitStore, RateLimiter},
    session::{cookies::ACCESS_COOKIE_NAME, MemoryRefreshLedger, SessionManager},
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use uuid::Uuid;

pub(crate) const TEST_SECRET: &str = "router-test-secret-router-test-secret";

pub(crate) fn auth_state() -> Arc<AuthState> {
    auth_state_with(AuthConfig::default())
}

pub(crate) fn auth_state_with(config: AuthConfig) -> Arc<AuthState> {
    build_state(config, Arc::new(MemoryDirectory::with_demo_users()))
}

pub(crate) fn auth_state_with_directory(directory: Arc<dyn UserDirectory>) -> Arc<AuthState> {
    build_state(AuthConfig::default(), directory)
}

fn build_state(config: AuthConfig, directory: Arc<dyn UserDirectory>) -> Arc<AuthState> {
    let sessions = SessionManager::new(
        SecretString::from(TEST_SECRET),
        directory,
        Arc::new(MemoryRefreshLedger::new()),
    );
    let limiter =
        RateLimiter::new(Arc::new(MemoryRateLimitStore::new())).with_sweep_probability(0.0);
    Arc::new(AuthState::new(config, sessions, limiter))
}

/// Sign `email` in directly and return its access cookie pair and user id.
pub(crate) async fn login_cookie(state: &AuthState, email: &str) -> Result<(String, Uuid)> {
    let user = state
        .sessions()
        .authenticate(&Credential::new(email, None))
        .await
        .ok_or_else(|| anyhow!("{email} should authenticate"))?;
    let tokens = state.sessions().create_session(&user)?;
    Ok((
        format!("{ACCESS_COOKIE_NAME}={}", tokens.access_token),
        user.id,
    ))
}

/// Demo-user directory that can go offline, or deactivate and drop users,
/// while sessions issued against it are still live.
#[derive(Debug, Default)]
pub(crate) struct FlakyDirectory {
    inner: MemoryDirectory,
    offline: AtomicBool,
    deactivated: Mutex<HashSet<Uuid>>,
    removed: Mutex<HashSet<Uuid>>,
}

impl FlakyDirectory {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryDirectory::with_demo_users(),
            ..Self::default()
        }
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn deactivate(&self, id: Uuid) {
        if let Ok(mut ids) = self.deactivated.lock() {
            ids.insert(id);
        }
    }

    pub(crate) fn remove(&self, id: Uuid) {
        if let Ok(mut ids) = self.removed.lock() {
            ids.insert(id);
        }
    }

    fn available(&self) -> Result<(), DirectoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn contains(ids: &Mutex<HashSet<Uuid>>, id: Uuid) -> bool {
        ids.lock().map(|ids| ids.contains(&id)).unwrap_or(false)
    }
}

impl UserDirectory for FlakyDirectory {
    fn authenticate<'a>(&'a self, credential: &'a Credential) -> DirectoryFuture<'a, Option<User>> {
        Box::pin(async move {
            self.available()?;
            self.inner.authenticate(credential).await
        })
    }

    fn find_by_id(&self, id: Uuid) -> DirectoryFuture<'_, Option<User>> {
        Box::pin(async move {
            self.available()?;
            if Self::contains(&self.removed, id) {
                return Ok(None);
            }
            let deactivated = Self::contains(&self.deactivated, id);
            Ok(self.inner.find_by_id(id).await?.map(|mut user| {
                if deactivated {
                    user.is_active = false;
                }
                user
            }))
        })
    }

    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DirectoryFuture<'_, ()> {
        Box::pin(async move {
            self.available()?;
            self.inner.record_login(id, at).await
        })
    }
}
