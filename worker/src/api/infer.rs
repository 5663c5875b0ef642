//! Inference endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use batchgate_common::{InferRequest, InferResponse};

use crate::error::{Error, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/infer", post(infer))
}

/// POST /v1/infer: enqueue one request and block until its batch executes.
///
/// If the client disconnects while we wait, this future is dropped along with
/// the receiver; the queued request still executes and the batcher's send is
/// simply ignored. The in-flight guard unwinds either way.
async fn infer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InferRequest>,
) -> Result<Json<InferResponse>> {
    let _guard = state.telemetry.track_request();
    let request_id = request.request_id.clone();

    tracing::debug!(
        request_id = %request_id,
        priority = request.priority.as_str(),
        "request enqueued"
    );

    let rx = state.queue.enqueue(request);
    state.batcher.signal();

    let outcome = rx
        .await
        .map_err(|_| Error::Internal("request dropped during shutdown".to_string()))??;

    Ok(Json(InferResponse {
        request_id,
        result: outcome.result,
        worker_id: state.config.worker.id.clone(),
        latency_ns: outcome.latency_ns,
        batch_size: outcome.batch_size,
        queue_wait_ms: outcome.queue_wait_ms,
        priority_used: outcome.priority_used.as_str().to_string(),
    }))
}
