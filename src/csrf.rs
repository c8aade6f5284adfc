//! Double-submit CSRF tokens.
//!
//! The token is random and independent of identity, so it can be issued before
//! login. The browser carries it in a cookie and echoes it in a header (or a
//! JSON body field); a request passes only when both copies are byte-equal.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

pub const CSRF_COOKIE_NAME: &str = "custos_csrf";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
pub const CSRF_BODY_FIELD: &str = "csrfToken";

const TOKEN_BYTES: usize = 32;

#[derive(Clone, Copy, Debug, Default)]
pub struct CsrfGuard;

impl CsrfGuard {
    /// Create a fresh token.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn issue(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate csrf token")?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }

    /// Compare the cookie copy with the request copy. Absent or empty fails.
    #[must_use]
    pub fn validate(&self, token_from_cookie: Option<&str>, token_from_request: Option<&str>) -> bool {
        match (token_from_cookie, token_from_request) {
            (Some(cookie), Some(request)) if !cookie.is_empty() && !request.is_empty() => {
                constant_time_eq(cookie.as_bytes(), request.as_bytes())
            }
            _ => false,
        }
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
