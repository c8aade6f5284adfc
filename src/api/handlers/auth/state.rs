//! Auth state and configuration shared by the handlers and the guard.

use crate::{
    csrf::CsrfGuard,
    rate_limit::{RateLimitPolicy, RateLimiter},
    session::{cookies::CookiePolicy, SessionManager},
};
use std::time::Duration;

const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:5173";
const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Actions with their own rate-limit bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitAction {
    Login,
    Logout,
    Me,
    Refresh,
    Csrf,
}

impl RateLimitAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Me => "me",
            Self::Refresh => "refresh",
            Self::Csrf => "csrf",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    login_max_attempts: u32,
    login_window_seconds: u64,
    refresh_max_attempts: u32,
    refresh_window_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            login_max_attempts: 5,
            login_window_seconds: DEFAULT_WINDOW_SECONDS,
            refresh_max_attempts: 10,
            refresh_window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_login_limit(mut self, max_attempts: u32, window_seconds: u64) -> Self {
        self.login_max_attempts = max_attempts;
        self.login_window_seconds = window_seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_limit(mut self, max_attempts: u32, window_seconds: u64) -> Self {
        self.refresh_max_attempts = max_attempts;
        self.refresh_window_seconds = window_seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Cookies are only marked `Secure` when the frontend is served over TLS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    #[must_use]
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::new(self.session_cookie_secure())
    }

    #[must_use]
    pub fn rate_limit_policy(&self, action: RateLimitAction) -> RateLimitPolicy {
        let (max_requests, window_seconds) = match action {
            RateLimitAction::Login => (self.login_max_attempts, self.login_window_seconds),
            RateLimitAction::Refresh => (self.refresh_max_attempts, self.refresh_window_seconds),
            RateLimitAction::Logout => (30, DEFAULT_WINDOW_SECONDS),
            RateLimitAction::Me => (120, DEFAULT_WINDOW_SECONDS),
            RateLimitAction::Csrf => (60, DEFAULT_WINDOW_SECONDS),
        };
        RateLimitPolicy::new(action.as_str(), max_requests, Duration::from_secs(window_seconds))
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionManager,
    rate_limiter: RateLimiter,
    csrf: CsrfGuard,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, sessions: SessionManager, rate_limiter: RateLimiter) -> Self {
        Self {
            config,
            sessions,
            rate_limiter,
            csrf: CsrfGuard,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    #[must_use]
    pub fn csrf(&self) -> CsrfGuard {
        self.csrf
    }
}
