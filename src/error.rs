use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;

/// Error taxonomy for the session service and its stores.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A required upload field is missing or blank
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Disk or database I/O failure
    #[error("storage error: {0}")]
    Storage(String),
    /// Advisory write lock was not released in time (flat-file backend only)
    #[error("lock timeout: {0}")]
    LockTimeout(String),
}

/// Structured error payload returned to clients. `details` carries the
/// underlying cause for server-side failures only.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        let body = match self {
            AppError::Storage(details) => ErrorBody {
                error: "Internal storage failure".to_string(),
                details: Some(details),
            },
            AppError::LockTimeout(details) => ErrorBody {
                error: "Session store is busy".to_string(),
                details: Some(details),
            },
            AppError::Validation(message)
            | AppError::NotFound(message)
            | AppError::PayloadTooLarge(message) => ErrorBody {
                error: message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(format!("database error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(format!("io error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("serialization error: {}", err))
    }
}
