//! Integration tests driving the worker HTTP API end to end: enqueue through
//! the handler, batch in the batcher, execute on the simulated GPU, fan
//! results back over HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use batchgate_common::{InferRequest, InferResponse, Priority, WorkerTelemetry};
use batchgate_worker::config::BatchConfig;
use batchgate_worker::telemetry::TelemetrySource;
use batchgate_worker::{api, executor, AppState, Batcher, Config, PriorityQueue, TelemetryCollector};

struct TestWorker {
    app: Router,
    metrics_app: Router,
    batcher: Arc<Batcher>,
    handle: JoinHandle<()>,
}

impl TestWorker {
    fn start(batch: BatchConfig) -> Self {
        let config = Config {
            batch: batch.clone(),
            ..Default::default()
        };

        let queue = Arc::new(PriorityQueue::new());
        let exec = executor::create(&config.executor).unwrap();
        let batcher = Arc::new(Batcher::new(batch.batcher_config(), queue.clone(), exec));
        let handle = batcher.start();

        let telemetry = Arc::new(TelemetryCollector::new(
            config.worker.id.clone(),
            TelemetrySource::Simulated,
            batch.max_batch_size,
            queue.clone(),
            batcher.counters(),
        ));

        let state = Arc::new(AppState {
            config,
            queue,
            batcher: batcher.clone(),
            telemetry,
        });

        let app = Router::new()
            .nest("/v1", api::router())
            .route("/health", get(api::health::health))
            .with_state(state.clone());
        let metrics_app = api::metrics_router().with_state(state);

        Self {
            app,
            metrics_app,
            batcher,
            handle,
        }
    }

    async fn stop(self) {
        self.batcher.stop();
        self.handle.await.unwrap();
    }

    fn infer_request(&self, request: &InferRequest) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/infer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(request).unwrap()))
            .unwrap()
    }
}

fn request(id: &str, priority: Priority, timestamp: i64) -> InferRequest {
    InferRequest {
        request_id: id.to_string(),
        payload: format!("payload-{id}").into_bytes(),
        timestamp,
        model_name: "test-model".to_string(),
        priority,
    }
}

async fn parse_response(response: axum::response::Response) -> InferResponse {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn five_requests_ride_one_batch() {
    let worker = TestWorker::start(BatchConfig {
        max_batch_size: 32,
        max_wait_ms: 100,
        ..Default::default()
    });

    let mut tasks = Vec::new();
    for i in 0..5 {
        let app = worker.app.clone();
        let req = worker.infer_request(&request(&format!("r{i}"), Priority::Low, i));
        tasks.push(tokio::spawn(async move { app.oneshot(req).await.unwrap() }));
    }

    for task in tasks {
        let parsed = parse_response(task.await.unwrap()).await;
        assert_eq!(parsed.batch_size, 5);
        assert_eq!(parsed.worker_id, "worker-0");
        assert_eq!(parsed.priority_used, "LOW");
        assert!(parsed.queue_wait_ms >= 0);
        assert!(parsed.latency_ns > 0);
        assert!(!parsed.result.is_empty());
    }

    worker.stop().await;
}

#[tokio::test]
async fn high_priority_joins_the_first_batch() {
    let worker = TestWorker::start(BatchConfig {
        max_batch_size: 32,
        max_wait_ms: 200,
        ..Default::default()
    });

    let mut low_tasks = Vec::new();
    for i in 0..10 {
        let app = worker.app.clone();
        let req = worker.infer_request(&request(&format!("low{i}"), Priority::Low, i));
        low_tasks.push(tokio::spawn(async move { app.oneshot(req).await.unwrap() }));
    }

    // Give the LOW requests time to land in the queue, then add the HIGH one
    // before the first batch window closes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let high_response = worker
        .app
        .clone()
        .oneshot(worker.infer_request(&request("urgent", Priority::High, 999)))
        .await
        .unwrap();

    let parsed = parse_response(high_response).await;
    assert_eq!(parsed.batch_size, 11);
    assert_eq!(parsed.priority_used, "HIGH");

    for task in low_tasks {
        let parsed = parse_response(task.await.unwrap()).await;
        assert_eq!(parsed.batch_size, 11);
    }

    worker.stop().await;
}

#[tokio::test]
async fn batches_are_capped_at_max_batch_size() {
    let worker = TestWorker::start(BatchConfig {
        max_batch_size: 4,
        max_wait_ms: 50,
        ..Default::default()
    });

    let mut tasks = Vec::new();
    for i in 0..10 {
        let app = worker.app.clone();
        let req = worker.infer_request(&request(&format!("r{i}"), Priority::Low, i));
        tasks.push(tokio::spawn(async move { app.oneshot(req).await.unwrap() }));
    }

    let mut sizes = Vec::new();
    for task in tasks {
        sizes.push(parse_response(task.await.unwrap()).await.batch_size);
    }
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 2, 4, 4, 4, 4, 4, 4, 4, 4]);

    worker.stop().await;
}

#[tokio::test]
async fn telemetry_endpoint_reports_batch_activity() {
    let worker = TestWorker::start(BatchConfig {
        max_batch_size: 8,
        max_wait_ms: 20,
        ..Default::default()
    });

    let response = worker
        .app
        .clone()
        .oneshot(worker.infer_request(&request("r0", Priority::Medium, 1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let telemetry_response = worker
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/telemetry")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(telemetry_response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(telemetry_response.into_body(), usize::MAX)
        .await
        .unwrap();
    let telemetry: WorkerTelemetry = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(telemetry.worker_id, "worker-0");
    assert!(telemetry.healthy);
    assert_eq!(telemetry.current_batch_size, 1);
    assert!(telemetry.avg_latency_ms > 0.0);

    worker.stop().await;
}

#[tokio::test]
async fn metrics_listener_serves_prometheus_text() {
    let worker = TestWorker::start(BatchConfig::default());

    let response = worker
        .metrics_app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("worker_queue_depth"));
    assert!(text.contains("worker_total_requests"));

    let health = worker
        .metrics_app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    worker.stop().await;
}

#[tokio::test]
async fn health_endpoint_responds() {
    let worker = TestWorker::start(BatchConfig::default());

    let response = worker
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    worker.stop().await;
}
