//! Application error handling
//!
//! Every failure of a request ends up as an [`ApiError`], and this module is
//! the only place that turns one into a response. Clients always receive a
//! JSON body `{status, message}`:
//!
//! - business-rule rejections (conflict, failed authentication, missing user,
//!   consumed reset token) are sent with transport status 200 and the real
//!   status in the body;
//! - validation, authorization and internal failures are sent with the same
//!   status on the wire and in the body.

use crate::config::AppConfig;
use crate::repositories::StoreError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dashboard_shared::{AuthError, ErrorResponse};
use thiserror::Error;
use tracing::error;

/// Message sent instead of internal error details in production
pub const REDACTED_INTERNAL_MESSAGE: &str = "Internal server error occurred.";

/// API error type that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation Error: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Duplicate resource, or an owned resource that does not match the caller
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The reset token was consumed or has expired
    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Status reported in the body
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(err) => {
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::FORBIDDEN)
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Business rejections travel with transport status 200
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            ApiError::Conflict(_)
                | ApiError::Unauthorized(_)
                | ApiError::NotFound(_)
                | ApiError::Gone(_)
        )
    }

    /// Wire body for this error; internal details are redacted in production
    pub fn body(&self, production: bool) -> ErrorResponse {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR && production {
            REDACTED_INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        ErrorResponse {
            status: status.as_u16(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Store(err) => error!("Store error: {:?}", err),
            ApiError::Internal(err) => error!("Internal error: {:?}", err),
            _ => {}
        }

        let body = self.body(AppConfig::is_production());
        let transport = if self.is_business() {
            StatusCode::OK
        } else {
            self.status()
        };

        (transport, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error_status() {
        let error = ApiError::Validation("password is a required field".to_string());
        assert_eq!(error.to_string(), "Validation Error: password is a required field");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_business_rejection_uses_transport_200() {
        let error = ApiError::Gone(" Resource Error: Reset token has expired.".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_of(response).await;
        assert_eq!(body.status, 410);
        assert_eq!(body.message, " Resource Error: Reset token has expired.");
    }

    #[tokio::test]
    async fn test_token_missing_is_403_on_the_wire() {
        let response = ApiError::from(AuthError::TokenMissing).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_of(response).await;
        assert_eq!(
            body,
            ErrorResponse {
                status: 403,
                message: "Authorization Error: token missing.".to_string()
            }
        );
    }

    #[test]
    fn test_token_expired_is_401() {
        let error = ApiError::from(AuthError::TokenExpired);
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.to_string(), "TokenExpiredError");
    }

    #[test]
    fn test_internal_message_redacted_only_in_production() {
        let error = ApiError::Internal(anyhow::anyhow!("connection refused"));

        let dev = error.body(false);
        assert_eq!(dev.status, 500);
        assert_eq!(dev.message, "connection refused");

        let prod = error.body(true);
        assert_eq!(prod.message, REDACTED_INTERNAL_MESSAGE);
    }

    #[test]
    fn test_business_messages_never_redacted() {
        let error = ApiError::Conflict("A dashboard with that name already exists.".to_string());
        assert_eq!(
            error.body(true).message,
            "A dashboard with that name already exists."
        );
    }
}
