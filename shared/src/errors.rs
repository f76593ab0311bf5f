//! Error types for the Dashboards application

use thiserror::Error;

/// Outcome of locating and verifying a bearer token.
///
/// The display strings are the exact messages clients receive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization Error: token missing.")]
    TokenMissing,

    #[error("Authorization Error: Failed to verify token.")]
    TokenInvalid,

    #[error("TokenExpiredError")]
    TokenExpired,
}

impl AuthError {
    /// Status code reported for this failure (both in the body and on the wire)
    pub fn status(&self) -> u16 {
        match self {
            AuthError::TokenMissing | AuthError::TokenInvalid => 403,
            AuthError::TokenExpired => 401,
        }
    }

    /// Short label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::TokenMissing => "missing",
            AuthError::TokenInvalid => "invalid",
            AuthError::TokenExpired => "expired",
        }
    }
}
