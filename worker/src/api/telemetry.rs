//! Telemetry endpoint polled by the router.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use batchgate_common::WorkerTelemetry;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/telemetry", get(telemetry))
}

/// GET /v1/telemetry: current snapshot. Completes in microseconds; this sits
/// on the router's hot polling path.
async fn telemetry(State(state): State<Arc<AppState>>) -> Json<WorkerTelemetry> {
    Json(state.telemetry.snapshot())
}
