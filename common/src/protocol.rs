//! Wire types shared between the router and workers.
//!
//! All client↔router and router↔worker bodies are JSON. Opaque inference
//! payloads travel base64-encoded via the [`b64`] serde adapter so the same
//! request shape works for binary tensors and plain text alike.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request priority. Determines dequeue order on the worker; never preempts
/// an already-executing batch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

/// A single inference request. The router and the worker accept the same
/// shape; clients may talk to a worker directly in single-node setups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    /// Caller-chosen correlation id, echoed back in the response.
    pub request_id: String,
    /// Opaque model input, base64 on the wire.
    #[serde(with = "b64")]
    pub payload: Vec<u8>,
    /// Client-supplied timestamp in nanoseconds since the epoch. Orders
    /// requests within one priority level.
    pub timestamp: i64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub priority: Priority,
}

/// Response for a single request, carrying batch observability alongside the
/// result bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferResponse {
    pub request_id: String,
    #[serde(with = "b64")]
    pub result: Vec<u8>,
    /// Filled by the worker that executed the batch.
    #[serde(default)]
    pub worker_id: String,
    /// Wall time of the batch execution this request rode in.
    pub latency_ns: i64,
    /// Size of that batch.
    pub batch_size: i32,
    /// Time this request spent queued before the batch started.
    pub queue_wait_ms: i32,
    pub priority_used: String,
}

/// Point-in-time snapshot of a worker's load and hardware state. Produced by
/// the worker's telemetry collector, cached by the router's registry, and the
/// sole input to routing scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTelemetry {
    pub worker_id: String,
    pub vram_free_gb: f64,
    pub vram_total_gb: f64,
    /// 0–100.
    pub gpu_utilization: f64,
    pub temperature_c: f64,
    pub queue_depth: i32,
    pub avg_latency_ms: f64,
    pub current_batch_size: i32,
    pub healthy: bool,
}

/// Aggregate cluster view pushed to dashboard WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterState {
    pub workers: Vec<WorkerState>,
    pub routing_distribution: HashMap<String, u64>,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerState {
    #[serde(default)]
    pub id: String,
    pub address: String,
    pub score: f64,
    pub vram_free_gb: f64,
    pub vram_total_gb: f64,
    pub gpu_utilization: f64,
    pub temperature_c: f64,
    pub queue_depth: i32,
    pub avg_latency_ms: f64,
    pub current_batch: i32,
    pub healthy: bool,
}

/// Serde adapter encoding `Vec<u8>` as a base64 string.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
