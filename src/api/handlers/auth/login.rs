//! Credential login.

use super::{
    session::session_cookies,
    state::AuthState,
    types::{ErrorResponse, LoginRequest, SessionResponse, UserSummary},
    utils::valid_email,
};
use crate::{
    api::error::ApiError,
    csrf::CSRF_COOKIE_NAME,
    directory::{normalize_email, Credential},
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, instrument};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session and CSRF cookies set", body = SessionResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::InvalidInput(err.body_text()))?;

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::InvalidInput("Invalid email".to_string()));
    }
    let password = request
        .password
        .filter(|password| !password.is_empty())
        .map(SecretString::from);

    let user = auth_state
        .sessions()
        .authenticate(&Credential::new(email, password))
        .await
        .ok_or(ApiError::Unauthenticated)?;
    let tokens = auth_state.sessions().create_session(&user)?;
    let csrf_token = auth_state.csrf().issue()?;

    let mut headers = session_cookies(auth_state.config(), &tokens)?;
    let csrf_cookie = auth_state
        .config()
        .cookie_policy()
        .csrf_cookie(CSRF_COOKIE_NAME, &csrf_token)
        .context("Failed to build csrf cookie")?;
    headers.append(SET_COOKIE, csrf_cookie);

    info!(user_id = %user.id, role = %user.role, "signed in");
    let body = SessionResponse {
        user: UserSummary::from(&user),
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
        csrf_token,
    };
    Ok((StatusCode::OK, headers, Json(body)))
}
