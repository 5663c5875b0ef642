//! Worker registry: the router's view of the fleet.
//!
//! Entries are fixed at startup from the configured endpoint list; only their
//! health and cached telemetry mutate. Mutations are serialized behind one
//! RwLock; readers get a consistent per-entry view.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use batchgate_common::WorkerTelemetry;

/// One known worker.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    /// Stable endpoint, `host:port`.
    pub address: String,
    /// Last polled snapshot. Seeded with optimistic placeholder values so the
    /// first selection window before the initial poll is not empty.
    pub telemetry: Option<WorkerTelemetry>,
    /// Consecutive failed polls or forwards. Reset on any success.
    pub fail_count: u32,
    pub healthy: bool,
    pub last_update: Option<DateTime<Utc>>,
}

/// Keyed collection of worker entries plus the HTTP client used to reach
/// them. The client is shared; reqwest clients are cheap to clone and safe
/// for concurrent use.
pub struct Registry {
    http: reqwest::Client,
    fail_threshold: u32,
    workers: RwLock<HashMap<String, WorkerEntry>>,
}

/// Endpoints are configured as bare `host:port`; prefix a scheme for reqwest.
pub fn base_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

fn placeholder_telemetry() -> WorkerTelemetry {
    WorkerTelemetry {
        worker_id: String::new(),
        vram_free_gb: 5.0,
        vram_total_gb: 5.0,
        gpu_utilization: 0.0,
        temperature_c: 0.0,
        queue_depth: 0,
        avg_latency_ms: 0.0,
        current_batch_size: 0,
        healthy: true,
    }
}

impl Registry {
    pub fn new(endpoints: &[String], fail_threshold: u32) -> Self {
        let workers = endpoints
            .iter()
            .map(|addr| {
                (
                    addr.clone(),
                    WorkerEntry {
                        address: addr.clone(),
                        telemetry: Some(placeholder_telemetry()),
                        fail_count: 0,
                        healthy: true,
                        last_update: None,
                    },
                )
            })
            .collect();

        Self {
            http: reqwest::Client::new(),
            fail_threshold: fail_threshold.max(1),
            workers: RwLock::new(workers),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Probe every endpoint once. A failed probe marks that entry unhealthy
    /// but does not abort startup; the poller will heal it when the worker
    /// comes up.
    pub async fn connect(&self) {
        let addresses: Vec<String> = self.workers.read().await.keys().cloned().collect();
        for address in addresses {
            let url = format!("{}/health", base_url(&address));
            let probe = self
                .http
                .get(&url)
                .timeout(Duration::from_secs(2))
                .send()
                .await;
            match probe {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(worker = %address, "connected to worker");
                }
                Ok(response) => {
                    tracing::warn!(worker = %address, status = %response.status(), "worker probe rejected");
                    self.set_unhealthy(&address).await;
                }
                Err(e) => {
                    tracing::warn!(worker = %address, error = %e, "failed to connect to worker");
                    self.set_unhealthy(&address).await;
                }
            }
        }
    }

    async fn set_unhealthy(&self, address: &str) {
        if let Some(entry) = self.workers.write().await.get_mut(address) {
            entry.healthy = false;
        }
    }

    /// Snapshot of currently healthy entries.
    pub async fn get_healthy(&self) -> Vec<WorkerEntry> {
        self.workers
            .read()
            .await
            .values()
            .filter(|w| w.healthy)
            .cloned()
            .collect()
    }

    /// Snapshot of all entries.
    pub async fn get_all(&self) -> Vec<WorkerEntry> {
        self.workers.read().await.values().cloned().collect()
    }

    /// Replace the cached telemetry after a successful poll. Resets the fail
    /// count and adopts the snapshot's own healthy flag.
    pub async fn update_metrics(&self, address: &str, telemetry: WorkerTelemetry) {
        if let Some(entry) = self.workers.write().await.get_mut(address) {
            entry.healthy = telemetry.healthy;
            entry.telemetry = Some(telemetry);
            entry.fail_count = 0;
            entry.last_update = Some(Utc::now());
        }
    }

    /// Record one failed poll or forward. Crossing the threshold marks the
    /// worker unhealthy until a success heals it.
    pub async fn mark_failed(&self, address: &str) {
        if let Some(entry) = self.workers.write().await.get_mut(address) {
            entry.fail_count += 1;
            if entry.fail_count >= self.fail_threshold && entry.healthy {
                entry.healthy = false;
                tracing::warn!(
                    worker = %address,
                    failures = entry.fail_count,
                    "worker marked unhealthy"
                );
            }
        }
    }

    /// Reset a worker to healthy after any successful interaction.
    pub async fn mark_healthy(&self, address: &str) {
        if let Some(entry) = self.workers.write().await.get_mut(address) {
            if !entry.healthy {
                tracing::info!(worker = %address, "worker recovered");
            }
            entry.fail_count = 0;
            entry.healthy = true;
        }
    }
}
