//! Auth handlers and supporting modules.
//!
//! ## Cookies
//!
//! | Cookie | Contents | Flags |
//! |---|---|---|
//! | `custos_access` | access token | `HttpOnly`, `SameSite=Lax` |
//! | `custos_refresh` | refresh token | `HttpOnly`, `SameSite=Strict` |
//! | `custos_csrf` | CSRF token | readable, `SameSite=Strict` |
//!
//! All cookies use `Path=/` and gain `Secure` when the frontend base URL is
//! `https`. Browsers echo `custos_csrf` in `X-CSRF-Token` on unsafe requests.
//!
//! ## Rate Limits
//!
//! Per client and action within a 60 second window: `login` 5, `refresh` 10,
//! `logout` 30, `csrf` 60, `me` 120. Login and refresh limits are configurable.

pub(crate) mod csrf_token;
pub(crate) mod login;
pub(crate) mod me;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState, RateLimitAction};
