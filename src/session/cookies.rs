//! Cookie helpers for session and CSRF tokens.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE_NAME: &str = "custos_access";
pub const REFRESH_COOKIE_NAME: &str = "custos_refresh";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
        }
    }
}

/// Attributes shared by every cookie the service sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `HttpOnly` cookie holding a session token for `max_age_seconds`.
    ///
    /// # Errors
    /// Returns an error if the value contains characters invalid in a header.
    pub fn session_cookie(
        self,
        name: &str,
        value: &str,
        same_site: SameSite,
        max_age_seconds: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, value, true, same_site, max_age_seconds)
    }

    /// Readable cookie for the CSRF token; the client echoes it in a header.
    ///
    /// # Errors
    /// Returns an error if the value contains characters invalid in a header.
    pub fn csrf_cookie(self, name: &str, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{name}={value}; Path=/; SameSite={}", SameSite::Strict.as_str());
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Expire a session cookie immediately.
    ///
    /// # Errors
    /// Returns an error if the name contains characters invalid in a header.
    pub fn clear_cookie(self, name: &str, same_site: SameSite) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, "", true, same_site, 0)
    }

    fn build(
        self,
        name: &str,
        value: &str,
        http_only: bool,
        same_site: SameSite,
        max_age_seconds: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{name}={value}; Path=/");
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str(&format!(
            "; SameSite={}; Max-Age={}",
            same_site.as_str(),
            max_age_seconds.max(0)
        ));
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Read a cookie value from the `Cookie` request headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            (key == name && !val.is_empty()).then(|| val.to_string())
        })
}

/// Access token from the cookie, falling back to `Authorization: Bearer`.
#[must_use]
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_COOKIE_NAME).or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
