//! Client-facing inference endpoint with scoring, selection and failover.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use batchgate_common::{InferRequest, InferResponse};

use crate::error::{Error, Result};
use crate::registry::base_url;
use crate::scorer::score;
use crate::selector;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/infer", post(infer))
        .route("/health", get(health))
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// What one forwarding attempt produced.
enum ForwardOutcome {
    Ok(InferResponse),
    /// No usable answer from the worker; eligible for retry elsewhere.
    Transport(String),
    /// The worker answered with a failure it computed. Surfaced as-is: a
    /// different worker would reject the same input the same way.
    Rejected(String),
}

/// POST /v1/infer: pick a worker, forward, retry on transport failure.
async fn infer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InferRequest>,
) -> Result<Json<InferResponse>> {
    state.stats.record_request();

    let max_attempts = state.config.forward.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let healthy = state.registry.get_healthy().await;
        let candidates: Vec<(String, f64)> = healthy
            .iter()
            .map(|entry| {
                (
                    entry.address.clone(),
                    score(entry.telemetry.as_ref(), &state.config.score),
                )
            })
            .collect();

        let Some(address) = selector::select(&candidates, state.config.selection.top_k) else {
            return Err(Error::NoHealthyWorkers);
        };

        match forward(&state, &address, &request).await {
            ForwardOutcome::Ok(response) => {
                state.registry.mark_healthy(&address).await;
                state.stats.record_served(&address);
                tracing::debug!(
                    request_id = %request.request_id,
                    worker = %address,
                    attempt,
                    "request served"
                );
                return Ok(Json(response));
            }
            ForwardOutcome::Rejected(message) => {
                // The transport worked; only the compute failed.
                state.registry.mark_healthy(&address).await;
                return Err(Error::WorkerRejected(message));
            }
            ForwardOutcome::Transport(message) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    worker = %address,
                    attempt,
                    error = %message,
                    "worker forward failed"
                );
                state.registry.mark_failed(&address).await;
                last_error = message;
            }
        }
    }

    Err(Error::AllWorkersFailed(last_error))
}

/// One forwarding attempt with a fresh deadline, detached from however long
/// the client is willing to wait.
async fn forward(state: &AppState, address: &str, request: &InferRequest) -> ForwardOutcome {
    let url = format!("{}/v1/infer", base_url(address));
    let sent = state
        .registry
        .client()
        .post(&url)
        .timeout(state.config.forward.timeout())
        .json(request)
        .send()
        .await;

    let response = match sent {
        Ok(response) => response,
        Err(e) => return ForwardOutcome::Transport(e.to_string()),
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return ForwardOutcome::Rejected(format!("HTTP {status}: {body}"));
    }

    match response.json::<InferResponse>().await {
        Ok(parsed) => ForwardOutcome::Ok(parsed),
        Err(e) => ForwardOutcome::Transport(format!("malformed worker response: {e}")),
    }
}
