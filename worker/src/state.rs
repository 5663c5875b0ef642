//! Shared worker state.

use std::sync::Arc;

use crate::batcher::Batcher;
use crate::config::Config;
use crate::queue::PriorityQueue;
use crate::telemetry::TelemetryCollector;

/// Shared state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub queue: Arc<PriorityQueue>,
    pub batcher: Arc<Batcher>,
    pub telemetry: Arc<TelemetryCollector>,
}
