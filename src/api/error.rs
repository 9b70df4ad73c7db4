use crate::services::storage::StorageError;
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName(e) => AppError::BadRequest(e.to_string()),
            StorageError::AlreadyExists(name) => {
                AppError::Conflict(format!("File already exists: {}", name))
            }
            // A failed body stream reaches storage as an io::Error wrapping the multipart error
            StorageError::Io(e) => {
                let kind = e.kind();
                match e.into_inner() {
                    Some(inner) => match inner.downcast::<MultipartError>() {
                        Ok(multipart) => AppError::Multipart(*multipart),
                        Err(inner) => AppError::Io(io::Error::new(kind, inner)),
                    },
                    None => AppError::Io(io::Error::from(kind)),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Multipart(e) => {
                tracing::warn!("Multipart error: {}", e);
                (e.status(), e.body_text())
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
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
