//! Shared protocol types for the batchgate router and workers.

mod protocol;

pub use protocol::{
    b64, ClusterState, InferRequest, InferResponse, Priority, WorkerState, WorkerTelemetry,
};
