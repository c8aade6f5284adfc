//! User directory: resolves credentials and ids to user snapshots.
//!
//! The directory is an external collaborator. The security layer only reads
//! from it (plus last-login bookkeeping) and treats every failure as a denial.

use crate::access::{Permission, Role, User, WILDCARD};
use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::HashMap, future::Future, path::Path, pin::Pin, sync::RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Login credential. The password is optional for passwordless accounts.
#[derive(Clone, Debug)]
pub struct Credential {
    pub email: String,
    pub password: Option<SecretString>,
}

impl Credential {
    #[must_use]
    pub fn new(email: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }
}

pub trait UserDirectory: Send + Sync {
    /// Resolve a credential to an active user, `None` when nothing matches.
    fn authenticate<'a>(&'a self, credential: &'a Credential) -> DirectoryFuture<'a, Option<User>>;

    /// Look a user up by id, regardless of the active flag.
    fn find_by_id(&self, id: Uuid) -> DirectoryFuture<'_, Option<User>>;

    /// Record a successful login.
    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DirectoryFuture<'_, ()>;
}

/// Directory entry as stored, including the optional argon2 password hash.
#[derive(Clone, Debug, Deserialize)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub password_hash: Option<String>,
}

/// In-process directory used by the service and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<Uuid, DirectoryEntry>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.user.email = normalize_email(&entry.user.email);
                (entry.user.id, entry)
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Load entries from a JSON array file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid users file: {}", path.display()))
    }

    /// # Errors
    /// Returns an error if `raw` is not a JSON array of directory entries.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<DirectoryEntry> = serde_json::from_str(raw)?;
        Ok(Self::new(entries))
    }

    /// Passwordless demo accounts, one per role.
    #[must_use]
    pub fn with_demo_users() -> Self {
        Self::new([
            demo_entry(
                1,
                "admin@custos.dev",
                "Portal Administrator",
                Role::Admin,
                None,
                vec![Permission::new(WILDCARD, WILDCARD)],
            ),
            demo_entry(
                2,
                "member@custos.dev",
                "Mandate Member",
                Role::MandateMember,
                Some("mandate-001"),
                vec![
                    Permission::new("read", "deals").with_condition("mandate_id", "mandate-001"),
                    Permission::new("read", "documents")
                        .with_condition("mandate_id", "mandate-001"),
                    Permission::new("read", "dashboard"),
                ],
            ),
            demo_entry(
                3,
                "viewer@custos.dev",
                "Read-only Viewer",
                Role::Viewer,
                None,
                vec![Permission::new("read", "dashboard")],
            ),
            demo_entry(
                4,
                "analyst@custos.dev",
                "AI Analyst",
                Role::AiAnalyst,
                None,
                vec![
                    Permission::new("read", "analytics"),
                    Permission::new(WILDCARD, "ai_insights"),
                ],
            ),
        ])
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, DirectoryEntry>>, DirectoryError> {
        self.entries
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))
    }
}

impl UserDirectory for MemoryDirectory {
    fn authenticate<'a>(&'a self, credential: &'a Credential) -> DirectoryFuture<'a, Option<User>> {
        Box::pin(async move {
            let email = normalize_email(&credential.email);
            let entries = self.read()?;
            let Some(entry) = entries.values().find(|entry| entry.user.email == email) else {
                debug!("no directory entry for login attempt");
                return Ok(None);
            };
            if !entry.user.is_active {
                debug!(user_id = %entry.user.id, "inactive user attempted login");
                return Ok(None);
            }
            if let Some(hash) = &entry.password_hash {
                let Some(password) = &credential.password else {
                    return Ok(None);
                };
                if !verify_password(hash, password) {
                    return Ok(None);
                }
            }
            Ok(Some(entry.user.clone()))
        })
    }

    fn find_by_id(&self, id: Uuid) -> DirectoryFuture<'_, Option<User>> {
        Box::pin(async move { Ok(self.read()?.get(&id).map(|entry| entry.user.clone())) })
    }

    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> DirectoryFuture<'_, ()> {
        Box::pin(async move {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
            if let Some(entry) = entries.get_mut(&id) {
                entry.user.last_login = Some(at);
            }
            Ok(())
        })
    }
}

fn demo_entry(
    n: u128,
    email: &str,
    name: &str,
    role: Role,
    mandate_id: Option<&str>,
    permissions: Vec<Permission>,
) -> DirectoryEntry {
    DirectoryEntry {
        user: User {
            id: Uuid::from_u128(n),
            email: email.to_string(),
            name: name.to_string(),
            role,
            mandate_id: mandate_id.map(str::to_string),
            permissions,
            is_active: true,
            last_login: None,
        },
        password_hash: None,
    }
}

fn verify_password(hash: &str, password: &SecretString) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!("Invalid password hash in directory: {err}");
            false
        }
    }
}

/// Normalize an email for lookups.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
