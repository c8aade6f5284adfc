//! HTTP error mapping.
//!
//! Every failure leaves the service as `{"error": "<message>"}`. Token and
//! directory failures never carry their cause in the body.

use crate::{
    api::handlers::auth::types::ErrorResponse, rate_limit::RateLimitResult,
    session::SessionError,
};
use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::error;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("Too many requests")]
    RateLimited(RateLimitResult),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Internal server error")]
    Unexpected(#[source] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            retry_after: None,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid | SessionError::Expired => Self::Unauthenticated,
            SessionError::Issue => Self::Unexpected(err.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Unexpected(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::RateLimited(result) => {
                let retry_after = result.retry_after_seconds.unwrap_or(1);
                let mut headers = HeaderMap::new();
                insert_rate_limit_headers(&mut headers, result);
                headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
                let body = ErrorResponse {
                    error: self.to_string(),
                    retry_after: Some(retry_after),
                };
                (status, headers, Json(body)).into_response()
            }
            Self::Unexpected(err) => {
                error!("Unexpected error: {err:#}");
                (status, Json(self.body())).into_response()
            }
            _ => (status, Json(self.body())).into_response(),
        }
    }
}

/// Set `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(result.reset_at_seconds()));
}
