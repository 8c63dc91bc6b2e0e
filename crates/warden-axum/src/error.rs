//! API error rendering

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use warden_auth_core::AuthError;
use warden_isolation::IsolationError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Auth(e) => e.status_code(),
            Self::Isolation(e) => e.status_code(),
            Self::BadRequest(_) => 400,
            Self::Internal(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Isolation(e) => e.error_code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the caller
    fn public_message(&self) -> String {
        if self.status_code().is_server_error() && !self.is_retryable() {
            return "internal error".to_string();
        }
        match self {
            Self::Auth(AuthError::TenantIneligible { reason }) => reason.to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Auth(AuthError::AccountLocked { retry_after }) => {
                Some(serde_json::json!({ "retry_after_secs": retry_after.as_secs() }))
            }
            Self::Auth(AuthError::InsufficientRole { required, .. }) => {
                Some(serde_json::json!({ "required_role": required }))
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_retryable())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "internal API error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.public_message(),
                details: self.details(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::Auth(AuthError::AccountLocked { retry_after }) = &self {
            // Round up so clients never retry a second early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use warden_types::{IneligibleReason, Role};

    #[test]
    fn test_lockout_sets_retry_after() {
        let err = ApiError::from(AuthError::AccountLocked {
            retry_after: Duration::from_millis(240_500),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "241");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::TokenReplayDetected).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::TenantIneligible {
                reason: IneligibleReason::TenantSuspended
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(IsolationError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::Timeout("rotation")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ApiError::from(AuthError::Database("connection refused on 10.0.0.3".into()));
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_role_details() {
        let err = ApiError::from(AuthError::InsufficientRole {
            required: Role::Admin,
            actual: Role::Staff,
        });
        assert_eq!(err.details(), Some(serde_json::json!({ "required_role": "ADMIN" })));
    }
}
