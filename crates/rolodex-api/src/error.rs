use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rolodex_core::SyncError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("External dependency error: {0}")]
    External(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rolodex_core::Error> for AppError {
    fn from(error: rolodex_core::Error) -> Self {
        match error {
            rolodex_core::Error::NotFound(message) => Self::NotFound(message),
            rolodex_core::Error::InvalidInput(message) => Self::BadRequest(message),
            other => {
                tracing::error!(error = %other, "Store failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<SyncError> for AppError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::InProgress => Self::Conflict(error.to_string()),
            SyncError::RateLimitExceeded { .. } | SyncError::RemoteServer { .. } => {
                Self::Unavailable(error.to_string())
            }
            SyncError::Credentials(_) => Self::Unauthorized(error.to_string()),
            SyncError::RemoteRejected { .. }
            | SyncError::Transport(_)
            | SyncError::InvalidPayload(_) => Self::External(error.to_string()),
            SyncError::Storage(inner) => inner.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
