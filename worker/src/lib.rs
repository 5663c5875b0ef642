//! Per-GPU inference worker: priority queue, adaptive micro-batcher,
//! executor abstraction and telemetry.

pub mod api;
pub mod batcher;
pub mod config;
pub mod error;
pub mod executor;
pub mod queue;
pub mod state;
pub mod telemetry;

pub use batcher::{BatchCounters, Batcher, BatcherConfig};
pub use config::Config;
pub use executor::{Executor, SimulatedGpu};
pub use queue::{BatchedResult, PendingRequest, PriorityQueue};
pub use state::AppState;
pub use telemetry::{TelemetryCollector, TelemetrySource};
