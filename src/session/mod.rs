//! Session lifecycle: login, token verification, refresh rotation, logout.
//!
//! Flow Overview:
//! 1) `authenticate` resolves a credential through the user directory.
//! 2) `create_session` mints a short-lived access token and a long-lived
//!    refresh token, both HMAC signed with the server secret.
//! 3) `verify_access_token` is a pure signature + expiry check; no lookup.
//! 4) `refresh` re-resolves the user, spends the refresh token id in the
//!    ledger and mints a new pair. A spent id never verifies again.
//! 5) `revoke` spends the caller's refresh token id so a stolen copy dies
//!    with logout. A token minted for another subject is left alone.
//!
//! Security boundaries: callers only ever see `Invalid` or `Expired`, and the
//! HTTP layer collapses both to 401. Detailed causes are logged at debug.

pub mod cookies;
mod ledger;
pub mod token;

pub use ledger::{MemoryRefreshLedger, RefreshLedger};
pub use token::{SessionClaims, TokenKind};

use crate::{
    access::User,
    directory::{Credential, UserDirectory},
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{debug, error, info};
use ulid::Ulid;
use uuid::Uuid;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LEDGER_SWEEP_PROBABILITY: f64 = 0.01;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session token")]
    Invalid,
    #[error("session token expired")]
    Expired,
    #[error("failed to issue session tokens")]
    Issue,
}

impl From<token::Error> for SessionError {
    fn from(err: token::Error) -> Self {
        match err {
            token::Error::Expired => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// A freshly minted access/refresh pair.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

/// Result of a successful refresh: new tokens plus the re-resolved user.
#[derive(Clone, Debug)]
pub struct Refreshed {
    pub tokens: SessionTokens,
    pub user: User,
}

pub struct SessionManager {
    secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    directory: Arc<dyn UserDirectory>,
    ledger: Arc<dyn RefreshLedger>,
    ledger_sweep_probability: f64,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        secret: SecretString,
        directory: Arc<dyn UserDirectory>,
        ledger: Arc<dyn RefreshLedger>,
    ) -> Self {
        Self {
            secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            directory,
            ledger,
            ledger_sweep_probability: DEFAULT_LEDGER_SWEEP_PROBABILITY,
        }
    }

    /// Probability in `[0, 1]` that a refresh or revoke also sweeps spent ids
    /// past their expiry from the ledger.
    #[must_use]
    pub fn with_ledger_sweep_probability(mut self, probability: f64) -> Self {
        self.ledger_sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn directory(&self) -> &dyn UserDirectory {
        self.directory.as_ref()
    }

    /// Resolve a credential to an active user.
    ///
    /// Directory failures are logged and reported as `None`.
    pub async fn authenticate(&self, credential: &Credential) -> Option<User> {
        match self.directory.authenticate(credential).await {
            Ok(Some(user)) if user.is_active => {
                if let Err(err) = self
                    .directory
                    .record_login(user.id, chrono::Utc::now())
                    .await
                {
                    error!("Failed to record login: {err}");
                }
                Some(user)
            }
            Ok(_) => None,
            Err(err) => {
                error!("User directory failed during authentication: {err}");
                None
            }
        }
    }

    /// Mint an access/refresh pair for `user`.
    ///
    /// # Errors
    /// Returns `SessionError::Issue` if signing fails.
    pub fn create_session(&self, user: &User) -> Result<SessionTokens, SessionError> {
        self.create_session_at(user, now_unix_seconds())
    }

    /// Same as [`Self::create_session`] with an explicit clock.
    ///
    /// # Errors
    /// Returns `SessionError::Issue` if signing fails.
    pub fn create_session_at(&self, user: &User, now: i64) -> Result<SessionTokens, SessionError> {
        let access = self.claims(user.id, TokenKind::Access, now, self.access_ttl_seconds);
        let refresh = self.claims(user.id, TokenKind::Refresh, now, self.refresh_ttl_seconds);
        let sign = |claims: &SessionClaims| {
            token::sign_hs256(self.secret.expose_secret().as_bytes(), claims).map_err(|err| {
                error!("Failed to sign session token: {err}");
                SessionError::Issue
            })
        };

        Ok(SessionTokens {
            access_token: sign(&access)?,
            refresh_token: sign(&refresh)?,
            access_expires_at: access.exp,
            refresh_expires_at: refresh.exp,
            access_ttl_seconds: self.access_ttl_seconds,
            refresh_ttl_seconds: self.refresh_ttl_seconds,
        })
    }

    /// # Errors
    /// Returns `Expired` or `Invalid` when the token does not verify.
    pub fn verify_access_token(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_access_token_at(token, now_unix_seconds())
    }

    /// # Errors
    /// Returns `Expired` or `Invalid` when the token does not verify.
    pub fn verify_access_token_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        self.verify(token, TokenKind::Access, now)
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// # Errors
    /// Returns `Expired` for an expired token and `Invalid` for a bad signature,
    /// an already spent token, or a user that no longer exists or is inactive.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Refreshed, SessionError> {
        self.refresh_at(refresh_token, now_unix_seconds()).await
    }

    /// # Errors
    /// See [`Self::refresh`].
    pub async fn refresh_at(&self, refresh_token: &str, now: i64) -> Result<Refreshed, SessionError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh, now)?;
        if self.ledger.is_consumed(&claims.jti) {
            debug!(jti = %claims.jti, "refresh token replayed");
            return Err(SessionError::Invalid);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| SessionError::Invalid)?;
        let user = match self.directory.find_by_id(user_id).await {
            Ok(Some(user)) if user.is_active => user,
            Ok(_) => {
                debug!(%user_id, "refresh for missing or inactive user");
                return Err(SessionError::Invalid);
            }
            Err(err) => {
                error!("User directory failed during refresh: {err}");
                return Err(SessionError::Invalid);
            }
        };

        // The lookup above may race with another refresh; only one spends the id.
        if !self.ledger.consume(&claims.jti, claims.exp) {
            debug!(jti = %claims.jti, "refresh token lost rotation race");
            return Err(SessionError::Invalid);
        }
        self.maybe_sweep_ledger(now);

        let tokens = self.create_session_at(&user, now)?;
        info!(%user_id, "session refreshed");
        Ok(Refreshed { tokens, user })
    }

    /// Logical logout for `subject`. Spends the refresh token id when it
    /// verifies and belongs to `subject`; otherwise does nothing. Always
    /// succeeds.
    pub fn revoke(&self, refresh_token: Option<&str>, subject: &str) {
        self.revoke_at(refresh_token, subject, now_unix_seconds());
    }

    pub fn revoke_at(&self, refresh_token: Option<&str>, subject: &str, now: i64) {
        if let Some(token) = refresh_token {
            match self.verify(token, TokenKind::Refresh, now) {
                Ok(claims) if claims.sub == subject => {
                    self.ledger.consume(&claims.jti, claims.exp);
                }
                Ok(claims) => {
                    debug!(owner = %claims.sub, %subject, "ignoring refresh token of another subject on logout");
                }
                Err(err) => debug!("ignoring unusable refresh token on logout: {err}"),
            }
        }
        self.maybe_sweep_ledger(now);
    }

    fn maybe_sweep_ledger(&self, now: i64) {
        if self.ledger_sweep_probability <= 0.0 {
            return;
        }
        if rand::thread_rng().gen_bool(self.ledger_sweep_probability) {
            let removed = self.ledger.sweep(now);
            if removed > 0 {
                debug!(removed, "swept expired refresh token ids");
            }
        }
    }

    fn verify(&self, token: &str, kind: TokenKind, now: i64) -> Result<SessionClaims, SessionError> {
        token::verify_hs256(token, self.secret.expose_secret().as_bytes(), kind, now).map_err(
            |err| {
                debug!(?kind, "session token rejected: {err}");
                SessionError::from(err)
            },
        )
    }

    fn claims(&self, user_id: Uuid, kind: TokenKind, now: i64, ttl: i64) -> SessionClaims {
        SessionClaims {
            v: token::TOKEN_VERSION,
            sub: user_id.to_string(),
            typ: kind,
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Ulid::new().to_string(),
        }
    }
}

#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}
