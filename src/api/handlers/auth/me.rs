use super::{
    state::AuthState,
    types::{ErrorResponse, UserSummary},
};
use crate::api::{error::ApiError, guard::AuthContext};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserSummary),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "User no longer exists or is inactive", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
        (status = 500, description = "User directory unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(user_id = %context.claims.sub))]
pub async fn me(
    auth_state: Extension<Arc<AuthState>>,
    context: Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = Uuid::parse_str(&context.claims.sub).map_err(|_| ApiError::Unauthenticated)?;

    // Always re-read: role and permissions may have changed since login.
    match auth_state.sessions().directory().find_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => Ok(Json(UserSummary::from(&user))),
        Ok(_) => {
            debug!("session user missing or inactive");
            Err(ApiError::NotFound("User not found"))
        }
        Err(err) => {
            error!("Failed to load current user: {err}");
            Err(ApiError::Unexpected(err.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{
        app,
        test_support::{auth_state_with_directory, login_cookie, FlakyDirectory},
    };
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{header::COOKIE, Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_me(router: Router, cookie: &str) -> Result<(StatusCode, serde_json::Value)> {
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/auth/me")
                    .header(COOKIE, cookie)
                    .body(Body::empty())?,
            )
            .await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn deactivated_or_deleted_user_is_not_found() -> Result<()> {
        let directory = Arc::new(FlakyDirectory::new());
        let state = auth_state_with_directory(Arc::<FlakyDirectory>::clone(&directory));
        let (viewer, viewer_id) = login_cookie(&state, "viewer@custos.dev").await?;
        let (analyst, analyst_id) = login_cookie(&state, "analyst@custos.dev").await?;

        let (status, body) = get_me(app(Arc::clone(&state))?, &viewer).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "viewer");

        directory.deactivate(viewer_id);
        let (status, body) = get_me(app(Arc::clone(&state))?, &viewer).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");

        directory.remove(analyst_id);
        let (status, _) = get_me(app(Arc::clone(&state))?, &analyst).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn directory_outage_is_an_internal_error() -> Result<()> {
        let directory = Arc::new(FlakyDirectory::new());
        let state = auth_state_with_directory(Arc::<FlakyDirectory>::clone(&directory));
        let (viewer, _) = login_cookie(&state, "viewer@custos.dev").await?;

        directory.set_offline(true);
        let (status, body) = get_me(app(Arc::clone(&state))?, &viewer).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        Ok(())
    }
}
