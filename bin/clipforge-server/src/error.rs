//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** internal errors are logged with full detail but only
//! a generic message is returned to the caller so that file paths or other
//! implementation details never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use clipforge_core::{InvalidRequest, RuntimeError};

/// All errors that can occur in the clipforge-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the task runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The submitted request failed structural validation.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::InvalidRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()),

            ServerError::Runtime(e) => match e {
                RuntimeError::TaskNotFound { task_id } => {
                    (StatusCode::NOT_FOUND, format!("task {task_id} not found"))
                }
                RuntimeError::QueueFull { .. } => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
                RuntimeError::Shutdown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "server is shutting down".to_owned(),
                ),
            },

            // Internal errors: log the full detail, return a generic message.
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full error chain before discarding it so diagnostic detail
        // is preserved in the server logs even though clients only see a
        // generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        error!(error = %e, "io error in request handling");
        ServerError::Internal(e.to_string())
    }
}
