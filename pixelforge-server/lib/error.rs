//! Error types for the pixelforge server.
//!
//! Pipeline errors from pixelforge-core pass through and are mapped onto
//! HTTP statuses in one place, so a handler can use `?` throughout and the
//! response still distinguishes "try again" (provider glitch) from "check
//! your configuration" and "you cannot afford this".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pixelforge_core::PixelforgeError;
use serde::Serialize;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An error that occurred while serving a request
#[derive(pretty_error_debug::Debug, Error)]
pub enum ServerError {
    /// A pipeline error from pixelforge-core
    #[error(transparent)]
    Core(#[from] PixelforgeError),

    /// The request payload was malformed
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The request was not authenticated
    #[error("unauthorized: {0}")]
    AuthError(String),

    /// The server configuration is invalid
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An unexpected internal failure
    #[error("internal server error: {0}")]
    InternalError(String),
}

/// A specialized `Result` type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Error payload returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error kind for programmatic handling
    pub kind: &'static str,

    /// Human-readable message
    pub error: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(core) => match core {
                PixelforgeError::Configuration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
                }
                PixelforgeError::ExternalService { .. } => {
                    (StatusCode::BAD_GATEWAY, "external_service")
                }
                PixelforgeError::GenerationParse(_) => {
                    (StatusCode::BAD_GATEWAY, "generation_parse")
                }
                PixelforgeError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                PixelforgeError::Execution { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "execution")
                }
                PixelforgeError::ResultParse(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "result_parse")
                }
                PixelforgeError::InsufficientCredits { .. } => {
                    (StatusCode::PAYMENT_REQUIRED, "insufficient_credits")
                }
                PixelforgeError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
                PixelforgeError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                PixelforgeError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            Self::ValidationError(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::AuthError(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
            Self::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                kind,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let error = ServerError::Core(PixelforgeError::InsufficientCredits {
            required: 20,
            available: 5,
        });
        assert_eq!(error.status_and_kind().0, StatusCode::PAYMENT_REQUIRED);

        let error = ServerError::Core(PixelforgeError::InvalidState {
            entity: "version x".into(),
            current: "accepted".into(),
            attempted: "accept".into(),
        });
        assert_eq!(error.status_and_kind().0, StatusCode::CONFLICT);

        let error = ServerError::Core(PixelforgeError::ExternalService {
            status: 500,
            message: "overloaded".into(),
        });
        assert_eq!(error.status_and_kind().0, StatusCode::BAD_GATEWAY);

        let error = ServerError::AuthError("no token".into());
        assert_eq!(error.status_and_kind().0, StatusCode::UNAUTHORIZED);
    }
}
