//! Relay error types with HTTP status and websocket frame mapping.
//!
//! [`RelayError`] is the central error type. On REST routes it renders as
//! a structured JSON body; on an open websocket it becomes an `error`
//! frame and the connection stays open.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ServerEvent;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "user 7 is not a participant of chat 42"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Service-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                  |
/// |-----------|---------------------|------------------------------|
/// | 1000–1999 | Validation / frames | 400 Bad Request              |
/// | 2000–2999 | Auth / Not Found    | 401 / 403 / 404              |
/// | 3000–3999 | Server              | 500 / 503                    |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Inbound websocket frame could not be parsed or is not allowed on
    /// this connection.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Missing, malformed, or expired bearer credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Entity lookup failed.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind (`"chat"`, `"notification"`, ...).
        entity: &'static str,
        /// Raw identifier.
        id: i64,
    },

    /// Storage backend failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for [`RelayError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidFrame(_) => 1002,
            Self::Unauthorized(_) => 2001,
            Self::NotFound { .. } => 2002,
            Self::Forbidden(_) => 2003,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidFrame(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into a websocket `error` frame.
    #[must_use]
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
