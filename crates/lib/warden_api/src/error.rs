//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use warden_core::AuthError;

/// Message keys clients can localize. Stable across releases.
pub const MISSING_TOKEN_KEY: &str = "access_token.missing";
pub const EXPIRED_TOKEN_KEY: &str = "access_token.expired";
pub const INVALID_TOKEN_KEY: &str = "access_token.invalid";

/// Convenience alias for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401; carries the message key.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            ApiError::Unauthorized(key) => (StatusCode::UNAUTHORIZED, "unauthorized", *key),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            ApiError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "Token store unavailable",
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken => ApiError::Unauthorized(MISSING_TOKEN_KEY),
            AuthError::TokenExpired => ApiError::Unauthorized(EXPIRED_TOKEN_KEY),
            AuthError::TokenInvalid => ApiError::Unauthorized(INVALID_TOKEN_KEY),
            AuthError::StoreUnavailable(_) | AuthError::LogoutFailed { .. } => {
                warn!(error = %e, "token store failure");
                ApiError::StoreUnavailable(e.to_string())
            }
            AuthError::UnknownResourceType(name) => {
                ApiError::NotFound(format!("unknown resource type '{name}'"))
            }
            AuthError::UndefinedMethod(_) | AuthError::Config(_) | AuthError::Internal(_) => {
                error!(error = %e, "authentication misconfigured");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::store::StoreError;

    #[test]
    fn auth_failures_map_to_message_keys() {
        for (err, key) in [
            (AuthError::MissingToken, MISSING_TOKEN_KEY),
            (AuthError::TokenExpired, EXPIRED_TOKEN_KEY),
            (AuthError::TokenInvalid, INVALID_TOKEN_KEY),
        ] {
            assert!(matches!(ApiError::from(err), ApiError::Unauthorized(k) if k == key));
        }
    }

    #[test]
    fn store_failures_are_not_unauthorized() {
        let err = ApiError::from(AuthError::StoreUnavailable(StoreError::Backend("down".into())));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized(INVALID_TOKEN_KEY).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }
}
