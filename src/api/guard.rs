//! Security middleware wrapping protected routes.
//!
//! Flow Overview (short-circuits on the first failure):
//! 1) Rate limit by client identity and action; 429 on rejection.
//! 2) CSRF double-submit check when required; 403 on mismatch.
//! 3) Access token from the session cookie or a bearer header; 401 on failure.
//! 4) Role/permission evaluation against a fresh directory snapshot; 403 on denial.
//! 5) Handler runs with an [`AuthContext`] in the request extensions.
//!
//! Every response that got past step 1 carries the `X-RateLimit-*` headers.

use super::{
    error::{insert_rate_limit_headers, ApiError},
    handlers::auth::AuthState,
};
use crate::{
    access::{authorize, PermissionCheck, Role, User},
    csrf::{CsrfGuard, CSRF_BODY_FIELD, CSRF_COOKIE_NAME, CSRF_HEADER_NAME},
    rate_limit::{client_identity, RateLimitPolicy},
    session::{
        cookies::{access_token, cookie_value},
        SessionClaims,
    },
};
use anyhow::anyhow;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

/// Largest body buffered while looking for a CSRF token field.
const MAX_CSRF_BODY_BYTES: usize = 64 * 1024;

/// Per-route security requirements.
#[derive(Clone, Debug, Default)]
pub struct GuardConfig {
    pub require_auth: bool,
    pub require_csrf: bool,
    pub rate_limit: Option<RateLimitPolicy>,
    pub required_roles: Vec<Role>,
    pub required_permissions: Vec<PermissionCheck>,
}

impl GuardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    #[must_use]
    pub fn require_auth(mut self) -> Self {
        self.require_auth = true;
        self
    }

    #[must_use]
    pub fn require_csrf(mut self) -> Self {
        self.require_csrf = true;
        self
    }

    /// Restrict to `roles`; implies authentication.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_roles.extend(roles);
        self.require_auth = true;
        self
    }

    /// Require `check`; implies authentication.
    #[must_use]
    pub fn with_permission(mut self, check: PermissionCheck) -> Self {
        self.required_permissions.push(check);
        self.require_auth = true;
        self
    }

    fn needs_authorization(&self) -> bool {
        !self.required_roles.is_empty() || !self.required_permissions.is_empty()
    }
}

/// Authenticated caller, available to handlers behind an auth guard.
///
/// `user` is only resolved when the guard evaluated roles or permissions.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub claims: SessionClaims,
    pub user: Option<User>,
}

/// Wrap every route in `router` with the guard.
pub fn protect(router: OpenApiRouter, config: GuardConfig) -> OpenApiRouter {
    router.route_layer(middleware::from_fn_with_state(Arc::new(config), enforce))
}

/// Guard middleware. Reads the shared [`AuthState`] from the request extensions.
pub async fn enforce(
    State(config): State<Arc<GuardConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(state) = request.extensions().get::<Arc<AuthState>>().cloned() else {
        return ApiError::Unexpected(anyhow!("auth state missing from request extensions"))
            .into_response();
    };

    let limit = match &config.rate_limit {
        Some(policy) => {
            let client = client_identity(request.headers());
            let result = state.rate_limiter().check_policy(&client, policy);
            if !result.allowed {
                debug!(client = %client, action = %policy.action, "request rate limited");
                return ApiError::RateLimited(result).into_response();
            }
            Some(result)
        }
        None => None,
    };

    let mut response = match admit(&config, &state, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => err.into_response(),
    };

    if let Some(result) = &limit {
        insert_rate_limit_headers(response.headers_mut(), result);
    }
    response
}

async fn admit(
    config: &GuardConfig,
    state: &AuthState,
    mut request: Request,
) -> Result<Request, ApiError> {
    if config.require_csrf {
        request = verify_csrf(state.csrf(), request).await?;
    }

    if config.require_auth {
        let token = access_token(request.headers()).ok_or(ApiError::Unauthenticated)?;
        let claims = state
            .sessions()
            .verify_access_token(&token)
            .map_err(|_| ApiError::Unauthenticated)?;

        let user = if config.needs_authorization() {
            Some(authorize_caller(config, state, &claims).await?)
        } else {
            None
        };
        request.extensions_mut().insert(AuthContext { claims, user });
    }

    Ok(request)
}

async fn authorize_caller(
    config: &GuardConfig,
    state: &AuthState,
    claims: &SessionClaims,
) -> Result<User, ApiError> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;
    let user = match state.sessions().directory().find_by_id(user_id).await {
        Ok(Some(user)) if user.is_active => user,
        Ok(_) => return Err(ApiError::Unauthenticated),
        Err(err) => {
            error!("User directory failed during authorization: {err}");
            return Err(ApiError::Unexpected(err.into()));
        }
    };

    if authorize(&user, &config.required_roles, &config.required_permissions) {
        Ok(user)
    } else {
        debug!(%user_id, role = %user.role, "authorization denied");
        Err(ApiError::Forbidden("Insufficient permissions"))
    }
}

async fn verify_csrf(csrf: CsrfGuard, request: Request) -> Result<Request, ApiError> {
    let cookie = cookie_value(request.headers(), CSRF_COOKIE_NAME);
    let header = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let (request, submitted) = match header {
        Some(token) => (request, Some(token)),
        None => token_from_body(request).await,
    };

    if csrf.validate(cookie.as_deref(), submitted.as_deref()) {
        Ok(request)
    } else {
        debug!("csrf validation failed");
        Err(ApiError::Forbidden("Invalid CSRF token"))
    }
}

/// Look for the token in a JSON body and hand the body back untouched.
async fn token_from_body(request: Request) -> (Request, Option<String>) {
    if !is_json(request.headers()) {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, MAX_CSRF_BODY_BYTES).await {
        Ok(bytes) => {
            let token = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|value| value.get(CSRF_BODY_FIELD)?.as_str().map(str::to_string));
            (Request::from_parts(parts, Body::from(bytes)), token)
        }
        Err(err) => {
            debug!("failed to buffer body for csrf token: {err}");
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        error::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING},
        test_support::{auth_state, auth_state_with_directory, login_cookie, FlakyDirectory},
    };
    use anyhow::Result;
    use axum::{
        http::{header::COOKIE, Method, Request, StatusCode},
        routing::{get, post},
        Extension, Json, Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    async fn whoami(Extension(context): Extension<AuthContext>) -> String {
        context.claims.sub
    }

    async fn echo(body: String) -> String {
        body
    }

    fn app(config: GuardConfig) -> Router {
        let config = Arc::new(config);
        Router::new()
            .route("/whoami", get(whoami))
            .route("/echo", post(echo))
            .route("/json", post(|Json(value): Json<serde_json::Value>| async move { Json(value) }))
            .route_layer(middleware::from_fn_with_state(config, enforce))
            .layer(Extension(auth_state()))
    }

    fn header<'a>(response: &'a Response, name: &axum::http::HeaderName) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn missing_session_is_unauthorized_with_limit_headers() -> Result<()> {
        let config = GuardConfig::new()
            .require_auth()
            .with_rate_limit(RateLimitPolicy::new("me", 3, Duration::from_secs(60)));
        let response = app(config)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(header(&response, &X_RATELIMIT_LIMIT), Some("3"));
        assert_eq!(header(&response, &X_RATELIMIT_REMAINING), Some("2"));
        Ok(())
    }

    #[tokio::test]
    async fn valid_session_reaches_handler() -> Result<()> {
        let state = auth_state();
        let (cookie, user_id) = login_cookie(&state, "viewer@custos.dev").await?;
        let app = Router::new()
            .route("/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(
                Arc::new(GuardConfig::new().require_auth()),
                enforce,
            ))
            .layer(Extension(state));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(COOKIE, cookie)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(body, user_id.to_string().as_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn role_and_permission_requirements() -> Result<()> {
        let state = auth_state();
        let (member, _) = login_cookie(&state, "member@custos.dev").await?;
        let (admin, _) = login_cookie(&state, "admin@custos.dev").await?;

        let guarded = |config: GuardConfig| {
            Router::new()
                .route("/whoami", get(whoami))
                .route_layer(middleware::from_fn_with_state(Arc::new(config), enforce))
                .layer(Extension(Arc::clone(&state)))
        };
        let call = |cookie: &str| -> Result<Request<Body>> {
            Ok(Request::builder()
                .uri("/whoami")
                .header(COOKIE, cookie)
                .body(Body::empty())?)
        };

        let admin_only = GuardConfig::new().with_roles([Role::Admin]);
        let response = guarded(admin_only.clone()).oneshot(call(&member)?).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = guarded(admin_only).oneshot(call(&admin)?).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let deals = GuardConfig::new().with_permission(
            PermissionCheck::new("read", "deals").with_attribute("mandate_id", "mandate-001"),
        );
        let response = guarded(deals).oneshot(call(&member)?).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let foreign = GuardConfig::new().with_permission(
            PermissionCheck::new("read", "deals").with_attribute("mandate_id", "mandate-999"),
        );
        let response = guarded(foreign).oneshot(call(&member)?).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn directory_outage_during_role_check_is_internal_error() -> Result<()> {
        let directory = Arc::new(FlakyDirectory::new());
        let state = auth_state_with_directory(Arc::<FlakyDirectory>::clone(&directory));
        let (admin, _) = login_cookie(&state, "admin@custos.dev").await?;
        let guarded = |config: GuardConfig| -> Router {
            Router::new()
                .route("/whoami", get(whoami))
                .route_layer(middleware::from_fn_with_state(Arc::new(config), enforce))
                .layer(Extension(Arc::clone(&state)))
        };
        let call = || -> Result<Request<Body>> {
            Ok(Request::builder()
                .uri("/whoami")
                .header(COOKIE, admin.as_str())
                .body(Body::empty())?)
        };

        directory.set_offline(true);
        let admin_only = GuardConfig::new().with_roles([Role::Admin]);
        let response = guarded(admin_only.clone()).oneshot(call()?).await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Session-only routes never consult the directory.
        let response = guarded(GuardConfig::new().require_auth())
            .oneshot(call()?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        directory.set_offline(false);
        let response = guarded(admin_only).oneshot(call()?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn csrf_header_must_match_cookie() -> Result<()> {
        let app = app(GuardConfig::new().require_csrf());

        let matching = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(COOKIE, "custos_csrf=abc")
            .header(CSRF_HEADER_NAME, "abc")
            .body(Body::empty())?;
        assert_eq!(app.clone().oneshot(matching).await?.status(), StatusCode::OK);

        let mismatched = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(COOKIE, "custos_csrf=abc")
            .header(CSRF_HEADER_NAME, "xyz")
            .body(Body::empty())?;
        assert_eq!(app.clone().oneshot(mismatched).await?.status(), StatusCode::FORBIDDEN);

        let missing = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .body(Body::empty())?;
        assert_eq!(app.oneshot(missing).await?.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn csrf_body_field_is_accepted_and_body_restored() -> Result<()> {
        let app = app(GuardConfig::new().require_csrf());
        let payload = r#"{"csrfToken":"abc","note":"kept"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/json")
                    .header(COOKIE, "custos_csrf=abc")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(payload))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["note"], "kept");
        Ok(())
    }

    #[tokio::test]
    async fn rate_limit_rejects_before_other_checks() -> Result<()> {
        let app = app(
            GuardConfig::new()
                .require_csrf()
                .with_rate_limit(RateLimitPolicy::new("echo", 1, Duration::from_secs(60))),
        );
        let request = || {
            Request::builder()
                .method(Method::POST)
                .uri("/echo")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
        };
        assert_eq!(app.clone().oneshot(request()?).await?.status(), StatusCode::FORBIDDEN);
        let limited = app.oneshot(request()?).await?;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&limited, &X_RATELIMIT_REMAINING), Some("0"));
        assert!(limited.headers().contains_key("retry-after"));
        Ok(())
    }
}
