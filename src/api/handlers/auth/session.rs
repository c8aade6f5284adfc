//! Session cookies plus the refresh and logout endpoints.

use super::{
    state::{AuthConfig, AuthState},
    types::{ErrorResponse, MessageResponse, SessionResponse, UserSummary},
};
use crate::{
    api::{error::ApiError, guard::AuthContext},
    csrf::CSRF_COOKIE_NAME,
    session::{
        cookies::{cookie_value, SameSite, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME},
        SessionTokens,
    },
};
use anyhow::Context;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{info, instrument};

#[utoipa::path(
    post,
    path = "/auth/refresh",
    params(
        ("X-CSRF-Token" = String, Header, description = "Echo of the custos_csrf cookie")
    ),
    responses(
        (status = 200, description = "Session rotated", body = SessionResponse),
        (status = 401, description = "Refresh token missing, expired or already used", body = ErrorResponse),
        (status = 403, description = "CSRF validation failed", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE_NAME).ok_or(ApiError::Unauthenticated)?;
    let refreshed = auth_state.sessions().refresh(&token).await?;

    // The guard already matched this cookie against the request token.
    let csrf_token = cookie_value(&headers, CSRF_COOKIE_NAME).unwrap_or_default();
    let response_headers = session_cookies(auth_state.config(), &refreshed.tokens)?;
    let body = SessionResponse {
        user: UserSummary::from(&refreshed.user),
        access_expires_at: refreshed.tokens.access_expires_at,
        refresh_expires_at: refreshed.tokens.refresh_expires_at,
        csrf_token,
    };
    Ok((StatusCode::OK, response_headers, Json(body)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    params(
        ("X-CSRF-Token" = String, Header, description = "Echo of the custos_csrf cookie")
    ),
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "CSRF validation failed", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(user_id = %context.claims.sub))]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    context: Extension<AuthContext>,
) -> impl IntoResponse {
    auth_state.sessions().revoke(
        cookie_value(&headers, REFRESH_COOKIE_NAME).as_deref(),
        &context.claims.sub,
    );
    info!("signed out");

    // Always clear the cookies, even if the refresh token was missing.
    let mut response_headers = HeaderMap::new();
    let policy = auth_state.config().cookie_policy();
    for (name, same_site) in [
        (ACCESS_COOKIE_NAME, SameSite::Lax),
        (REFRESH_COOKIE_NAME, SameSite::Strict),
    ] {
        if let Ok(cookie) = policy.clear_cookie(name, same_site) {
            response_headers.append(SET_COOKIE, cookie);
        }
    }

    let body = MessageResponse {
        message: "Signed out".to_string(),
    };
    (StatusCode::OK, response_headers, Json(body))
}

/// `Set-Cookie` headers for a freshly minted session pair.
pub(super) fn session_cookies(
    config: &AuthConfig,
    tokens: &SessionTokens,
) -> Result<HeaderMap, ApiError> {
    let policy = config.cookie_policy();
    let access = policy
        .session_cookie(
            ACCESS_COOKIE_NAME,
            &tokens.access_token,
            SameSite::Lax,
            tokens.access_ttl_seconds,
        )
        .context("Failed to build access cookie")?;
    let refresh = policy
        .session_cookie(
            REFRESH_COOKIE_NAME,
            &tokens.refresh_token,
            SameSite::Strict,
            tokens.refresh_ttl_seconds,
        )
        .context("Failed to build refresh cookie")?;

    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, access);
    headers.append(SET_COOKIE, refresh);
    Ok(headers)
}
