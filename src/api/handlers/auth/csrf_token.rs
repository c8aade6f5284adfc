use super::{
    state::AuthState,
    types::{CsrfResponse, ErrorResponse},
};
use crate::{api::error::ApiError, csrf::CSRF_COOKIE_NAME};
use anyhow::Context;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    get,
    path = "/auth/csrf",
    responses(
        (status = 200, description = "Fresh CSRF token; also set as the custos_csrf cookie", body = CsrfResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn csrf_token(
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let csrf_token = auth_state.csrf().issue()?;
    let cookie = auth_state
        .config()
        .cookie_policy()
        .csrf_cookie(CSRF_COOKIE_NAME, &csrf_token)
        .context("Failed to build csrf cookie")?;
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(CsrfResponse { csrf_token }),
    ))
}
