//! # Custos (Client Portal Security Gateway)
//!
//! `custos` is the authentication and request-security layer behind the client
//! portal. It issues and rotates sessions, defends state-changing requests
//! against cross-site request forgery, rate limits every auth action per client
//! and decides whether a caller may reach a route.
//!
//! ## Sessions
//!
//! A session is a pair of HS256-signed tokens carried in cookies: a short-lived
//! access token (15 minutes by default) and a long-lived refresh token (7 days).
//! Validity is derived from the signature and expiry alone. The only server-side
//! state is a ledger of spent refresh token ids, which makes rotation single-use
//! and lets logout retire the refresh token before it expires.
//!
//! ## Request Guard
//!
//! Every auth route runs through [`api::guard`] in a fixed order: rate limit,
//! CSRF (double-submit cookie), session, then role and permission checks from
//! [`access`]. `X-RateLimit-*` headers are attached to every guarded response.
//!
//! ## User Directory
//!
//! Users live behind [`directory::UserDirectory`]. The bundled
//! [`directory::MemoryDirectory`] loads a JSON seed file or falls back to demo
//! users for local development.

pub mod access;
pub mod api;
pub mod cli;
pub mod csrf;
pub mod directory;
pub mod rate_limit;
pub mod session;
