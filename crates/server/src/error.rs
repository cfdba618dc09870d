//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use vibefront_core::error::PageError;

/// Application-level error type for the page server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Page-level rendering failure.
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    /// Caller is not authorized for this endpoint.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Internal(_) | Self::Page(PageError::InternalError(_))
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Page(PageError::NotFound) => StatusCode::NOT_FOUND,
            Self::Page(PageError::Suspended) => StatusCode::GONE,
            Self::Page(PageError::InternalError(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Page(PageError::NotFound) => "Page not found".to_string(),
            Self::Page(PageError::Suspended) => "This storefront is unavailable".to_string(),
            Self::Page(PageError::InternalError(_)) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
