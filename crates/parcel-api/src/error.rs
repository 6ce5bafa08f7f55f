//! Error types for the API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body is `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parcel_core::{CalculationError, PackageServiceError, RepositoryError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No valid `session_id` cookie was sent.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A malformed request parameter or an unknown reference.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Well-formed input that failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The resource changed or is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Self::NotFound(msg),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InvalidReference(msg) => Self::BadRequest(msg),
            RepositoryError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<PackageServiceError> for ApiError {
    fn from(err: PackageServiceError) -> Self {
        match err {
            PackageServiceError::Validation(msg) => Self::Validation(msg),
            PackageServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<CalculationError> for ApiError {
    fn from(err: CalculationError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg) => msg,
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                msg
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
