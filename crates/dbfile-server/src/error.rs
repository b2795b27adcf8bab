//! Error types for the storage endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dbfile_storage_core::StorageError;
use serde::Serialize;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid admin token")]
    InvalidToken,

    #[error("Admin endpoints are disabled: no admin token configured")]
    AdminDisabled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// HTTP status for a failed storage operation.
pub fn storage_status(e: &StorageError) -> StatusCode {
    match e {
        StorageError::Transient(_) | StorageError::Timeout(_) | StorageError::Lock(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        StorageError::Auth(_) | StorageError::NotFound(_) => StatusCode::BAD_GATEWAY,
        StorageError::Configuration(_) => StatusCode::CONFLICT,
        StorageError::Io(_) | StorageError::CorruptLocalFile(_) | StorageError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            code: &'static str,
        }

        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            ApiError::AdminDisabled => (StatusCode::FORBIDDEN, "ADMIN_DISABLED"),
            ApiError::Storage(e) => (storage_status(e), e.code()),
        };

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
