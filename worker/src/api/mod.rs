//! Worker HTTP API.

pub mod health;
pub mod infer;
pub mod metrics;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the `/v1` API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(infer::router())
        .merge(telemetry::router())
}

/// Build the metrics listener router (`/metrics` + `/health`).
pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(metrics::router())
        .route("/health", axum::routing::get(health::health))
}
