//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn token_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn token_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::token_error(msg, e))
    }
}

/// API error type with automatic response conversion.
///
/// Every variant carries a human-readable message and a stable machine code
/// so clients can tell a missing credential from an invalid one.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized {
        message: String,
        code: &'static str,
    },
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    /// No refresh cookie came with the request.
    pub fn missing_credential() -> Self {
        Self::Unauthorized {
            message: "Refresh token missing".into(),
            code: "missing_credential",
        }
    }

    /// The refresh cookie failed signature, type or expiry checks.
    pub fn invalid_credential() -> Self {
        Self::Unauthorized {
            message: "Invalid refresh token".into(),
            code: "invalid_credential",
        }
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn token_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::Unauthorized { message, code } => (StatusCode::UNAUTHORIZED, message, code),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg, "rate_limited"),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "internal"),
        };
        (status, Json(ErrorResponse { message, code })).into_response()
    }
}
