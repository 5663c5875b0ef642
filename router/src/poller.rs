//! Background telemetry poller.
//!
//! One loop on a fixed cadence; each tick fans out a concurrent fetch per
//! worker with its own timeout. Selection never waits on this; it reads
//! whatever the registry has cached. The registry lock is never held across
//! an RPC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use batchgate_common::WorkerTelemetry;

use crate::registry::{base_url, Registry};

pub struct Poller {
    registry: Arc<Registry>,
    interval: Duration,
    timeout: Duration,
    stop: Notify,
    stopping: AtomicBool,
}

impl Poller {
    pub fn new(registry: Arc<Registry>, interval: Duration, timeout: Duration) -> Self {
        Self {
            registry,
            interval,
            timeout,
            stop: Notify::new(),
            stopping: AtomicBool::new(false),
        }
    }

    /// Spawn the polling loop. The first poll fires immediately so the
    /// registry has real telemetry before the first request arrives.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = self.clone();
        tracing::info!(
            interval_ms = poller.interval.as_millis() as u64,
            timeout_ms = poller.timeout.as_millis() as u64,
            "poller started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = poller.stop.notified() => return,
                }
                if poller.stopping.load(Ordering::Acquire) {
                    return;
                }
                poller.poll_all().await;
            }
        })
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.stop.notify_waiters();
    }

    /// Fetch telemetry from every worker concurrently and fold the outcomes
    /// into the registry.
    pub async fn poll_all(&self) {
        let workers = self.registry.get_all().await;
        let fetches = workers.into_iter().map(|entry| {
            let registry = self.registry.clone();
            let client = registry.client().clone();
            let timeout = self.timeout;
            async move {
                let url = format!("{}/v1/telemetry", base_url(&entry.address));
                let outcome = async {
                    let response = client.get(&url).timeout(timeout).send().await?;
                    response
                        .error_for_status()?
                        .json::<WorkerTelemetry>()
                        .await
                }
                .await;

                match outcome {
                    Ok(telemetry) => {
                        registry.update_metrics(&entry.address, telemetry).await;
                    }
                    Err(e) => {
                        tracing::debug!(worker = %entry.address, error = %e, "telemetry poll failed");
                        registry.mark_failed(&entry.address).await;
                    }
                }
            }
        });
        join_all(fetches).await;
    }
}
