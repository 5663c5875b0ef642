//! Error types for the router.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no healthy workers available")]
    NoHealthyWorkers,

    #[error("all workers failed: {0}")]
    AllWorkersFailed(String),

    /// The worker answered but the batch itself failed. Not retried: this
    /// usually reflects an input or model problem a different worker would
    /// hit too.
    #[error("worker rejected request: {0}")]
    WorkerRejected(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::NoHealthyWorkers => (StatusCode::SERVICE_UNAVAILABLE, "no_healthy_workers"),
            Error::AllWorkersFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, "all_workers_failed"),
            Error::WorkerRejected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "worker_rejected"),
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
