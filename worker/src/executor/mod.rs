//! Batch execution abstraction.
//!
//! The batcher hands a batch of opaque payloads to an [`Executor`] and fans
//! the results back to the waiting requests. Results are positional:
//! `results[i]` answers `payloads[i]`. Failure is all-or-nothing: a failed
//! batch fails every request in it.

mod simulation;

pub use simulation::SimulatedGpu;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};

/// A backend that runs one batch at a time. Called serially by the batcher;
/// implementations need not be reentrant. May block for tens to hundreds of
/// milliseconds.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executor kind for startup logging.
    fn name(&self) -> &'static str;

    /// Run one batch. Must return exactly one result per payload, in order.
    async fn execute_batch(&self, payloads: &[Vec<u8>]) -> Result<Vec<Vec<u8>>>;
}

/// Build the executor selected by configuration.
pub fn create(config: &ExecutorConfig) -> Result<Arc<dyn Executor>> {
    match config.kind.as_str() {
        "simulation" => Ok(Arc::new(SimulatedGpu::new(config.base_latency_ms))),
        other => Err(Error::Config(format!("unknown executor kind '{other}'"))),
    }
}
