//! Error types for the data-access layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Data Error Enum ==
/// Unified error type for repository and gateway operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Selector or id matched nothing after a verified database read
    #[error("Not found: {0}")]
    NotFound(String),

    /// A document with the same id already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The document targeted by an update is missing
    #[error("Does not exist: {0}")]
    DoesNotExist(String),

    /// The stored document failed the caller's security check
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Document is not an object, lacks an id, or has the wrong shape
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Underlying store I/O failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DataError {
    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Transport(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for DataError {
    fn into_response(self) -> Response {
        let status = match &self {
            DataError::NotFound(_) | DataError::DoesNotExist(_) => StatusCode::NOT_FOUND,
            DataError::AlreadyExists(_) => StatusCode::CONFLICT,
            DataError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DataError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            DataError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Transport details stay in the logs
        let message = match &self {
            DataError::Transport(msg) => {
                tracing::error!("Request failed on transport error: {}", msg);
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the data-access layer.
pub type Result<T> = std::result::Result<T, DataError>;
