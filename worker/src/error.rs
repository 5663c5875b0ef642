//! Error types for the worker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The executor failed the whole batch this request rode in. Not retried
    /// here; executor failures usually reflect input or model issues.
    #[error("batch execution failed: {0}")]
    Execution(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Execution(_) => (StatusCode::INTERNAL_SERVER_ERROR, "execution_failed"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_config"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
