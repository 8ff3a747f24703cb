use crate::backend::BackendError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Backend call failed: {0}")]
    Backend(#[from] BackendError),

    /// The blob was stored but its metadata record was not; the blob has been cleaned up.
    #[error("Upload failed after storing the blob: {0}")]
    PartialUpload(BackendError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// Logs `message` alongside the error, the way every action reports failures.
    pub fn logged(self, message: &str) -> Self {
        tracing::error!("{}: {}", message, self);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated".to_string())
            }
            AppError::Backend(BackendError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            AppError::Backend(BackendError::InvalidCredentials(msg)) => {
                (StatusCode::UNAUTHORIZED, msg)
            }
            AppError::Backend(BackendError::InvalidSession) => (
                StatusCode::UNAUTHORIZED,
                "Session is invalid or expired".to_string(),
            ),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream service failure".to_string(),
                )
            }
            AppError::PartialUpload(e) => {
                tracing::error!("Partial upload: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to upload file".to_string(),
                )
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
