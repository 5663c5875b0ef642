//! Dashboard WebSocket broadcaster.
//!
//! A 500 ms push loop serializes the current cluster view once and fans it
//! out to every connected dashboard client over a broadcast channel. Slow or
//! dead clients lag out of the channel and get disconnected; they never hold
//! up the push loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use batchgate_common::{ClusterState, WorkerState};

use crate::scorer::score;
use crate::state::AppState;

const PUSH_INTERVAL: Duration = Duration::from_millis(500);
const CLIENT_BUFFER: usize = 16;

/// Fan-out handle shared by the push loop and the WebSocket handlers.
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CLIENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, payload: String) {
        // Errors only mean nobody is listening right now.
        let _ = self.tx.send(payload);
    }
}

/// Build the current cluster view: every worker with its live score, plus
/// routing distribution and the request total.
pub async fn cluster_state(state: &AppState) -> ClusterState {
    let workers = state.registry.get_all().await;
    let workers = workers
        .into_iter()
        .map(|entry| {
            let worker_score = score(entry.telemetry.as_ref(), &state.config.score);
            let telemetry = entry.telemetry.unwrap_or_else(|| batchgate_common::WorkerTelemetry {
                worker_id: String::new(),
                vram_free_gb: 0.0,
                vram_total_gb: 0.0,
                gpu_utilization: 0.0,
                temperature_c: 0.0,
                queue_depth: 0,
                avg_latency_ms: 0.0,
                current_batch_size: 0,
                healthy: false,
            });
            WorkerState {
                id: telemetry.worker_id,
                address: entry.address,
                score: worker_score,
                vram_free_gb: telemetry.vram_free_gb,
                vram_total_gb: telemetry.vram_total_gb,
                gpu_utilization: telemetry.gpu_utilization,
                temperature_c: telemetry.temperature_c,
                queue_depth: telemetry.queue_depth,
                avg_latency_ms: telemetry.avg_latency_ms,
                current_batch: telemetry.current_batch_size,
                healthy: entry.healthy,
            }
        })
        .collect();

    ClusterState {
        workers,
        routing_distribution: state.stats.distribution(),
        total_requests: state.stats.total(),
    }
}

/// Spawn the periodic push loop.
pub fn start_push_loop(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PUSH_INTERVAL);
        loop {
            ticker.tick().await;
            let snapshot = cluster_state(&state).await;
            match serde_json::to_string(&snapshot) {
                Ok(payload) => state.broadcaster.publish(payload),
                Err(e) => tracing::error!(error = %e, "failed to serialize cluster state"),
            }
        }
    })
}

/// GET /ws: upgrade a dashboard client.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(mut socket: WebSocket, state: Arc<AppState>) {
    let mut updates = state.broadcaster.subscribe();
    tracing::info!(
        clients = state.broadcaster.client_count(),
        "dashboard client connected"
    );

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "dashboard client lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                // Clients only listen; any close/error ends the session.
                match incoming {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    tracing::info!(
        clients = state.broadcaster.client_count().saturating_sub(1),
        "dashboard client disconnected"
    );
}
