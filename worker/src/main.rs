//! Worker binary: accepts forwarded inference requests, batches them onto the
//! executor, and serves telemetry to the router.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use batchgate_worker::telemetry::TelemetrySource;
use batchgate_worker::{api, executor, AppState, Batcher, Config, PriorityQueue, TelemetryCollector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        worker_id = %config.worker.id,
        api_port = config.api.port,
        metrics_port = config.metrics.port,
        "starting batchgate worker"
    );

    let queue = Arc::new(PriorityQueue::new());
    let exec = executor::create(&config.executor)?;
    tracing::info!(executor = exec.name(), "executor ready");

    let batcher = Arc::new(Batcher::new(
        config.batch.batcher_config(),
        queue.clone(),
        exec,
    ));
    let batcher_handle = batcher.start();

    let source = TelemetrySource::resolve(&config.telemetry.source);
    let telemetry = Arc::new(TelemetryCollector::new(
        config.worker.id.clone(),
        source,
        config.batch.max_batch_size,
        queue.clone(),
        batcher.counters(),
    ));
    let simulation_handle = (source == TelemetrySource::Simulated).then(|| {
        telemetry.start_simulation()
    });

    let state = Arc::new(AppState {
        config: config.clone(),
        queue,
        batcher: batcher.clone(),
        telemetry,
    });

    // Metrics listener (Prometheus text + health).
    let metrics_app = api::metrics_router().with_state(state.clone());
    let metrics_addr = format!("{}:{}", config.api.host, config.metrics.port);
    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    tracing::info!("metrics endpoint on {}/metrics", metrics_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            tracing::error!(error = %e, "metrics server failed");
        }
    });

    // Main API listener.
    let app = Router::new()
        .nest("/v1", api::router())
        .route("/health", get(api::health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the queue before exiting so no accepted request is dropped.
    tracing::info!("shutting down, draining batcher");
    batcher.stop();
    batcher_handle.await?;
    if let Some(handle) = simulation_handle {
        handle.abort();
    }

    tracing::info!("worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
}
