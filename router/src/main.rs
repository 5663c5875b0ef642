//! Router binary: client-facing inference API plus the dashboard listener.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use batchgate_router::broadcast::{self, Broadcaster};
use batchgate_router::state::RoutingStats;
use batchgate_router::{routes, AppState, Config, Poller, Registry};

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

    let endpoints = config.workers.endpoint_list();
    if endpoints.is_empty() {
        return Err("no worker endpoints configured (set ROUTER__WORKERS__ENDPOINTS)".into());
    }

    tracing::info!(
        api_port = config.api.port,
        dashboard_port = config.dashboard.port,
        workers = ?endpoints,
        "starting batchgate router"
    );

    let registry = Arc::new(Registry::new(&endpoints, config.selection.fail_threshold));
    registry.connect().await;

    let poller = Arc::new(Poller::new(
        registry.clone(),
        config.poll.interval(),
        config.poll.timeout(),
    ));
    let poller_handle = poller.start();

    let state = Arc::new(AppState {
        stats: RoutingStats::new(&endpoints),
        broadcaster: Broadcaster::new(),
        registry,
        config: config.clone(),
    });

    let push_handle = broadcast::start_push_loop(state.clone());

    // Dashboard listener (WebSocket state stream + health).
    let dashboard_app = Router::new()
        .route("/ws", get(broadcast::ws_handler))
        .route("/health", get(routes::health))
        .with_state(state.clone());
    let dashboard_addr = format!("{}:{}", config.api.host, config.dashboard.port);
    let dashboard_listener = TcpListener::bind(&dashboard_addr).await?;
    tracing::info!("dashboard listening on {}", dashboard_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(dashboard_listener, dashboard_app).await {
            tracing::error!(error = %e, "dashboard server failed");
        }
    });

    // Main API listener.
    let app = routes::router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down router");
    poller.stop();
    poller_handle.await?;
    push_handle.abort();

    tracing::info!("router stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
}
