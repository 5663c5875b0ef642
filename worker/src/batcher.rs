//! Adaptive micro-batching loop.
//!
//! A single long-lived task drains the priority queue into size/time-bounded
//! batches and hands each to the executor. RPC handlers wake it with a
//! non-blocking [`Batcher::signal`] after enqueueing; wake-ups coalesce, so
//! the loop re-checks queue depth after every batch rather than trusting one
//! wake-up per request.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::executor::Executor;
use crate::queue::{BatchedResult, PendingRequest, PriorityQueue};

/// Batching knobs. The pressure thresholds drive the adaptive wait: a deep
/// queue flushes sooner, a shallow one waits longer to let batches fill.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub max_batch_size: usize,
    pub max_wait: Duration,
    pub high_pressure_depth: usize,
    pub high_pressure_wait: Duration,
    pub low_pressure_depth: usize,
    pub low_pressure_wait: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            max_wait: Duration::from_millis(50),
            high_pressure_depth: 100,
            high_pressure_wait: Duration::from_millis(20),
            low_pressure_depth: 10,
            low_pressure_wait: Duration::from_millis(80),
        }
    }
}

/// Counters updated by the batch loop, read lock-free by the telemetry
/// collector and the metrics endpoint.
#[derive(Default)]
pub struct BatchCounters {
    pub total_batches: AtomicU64,
    pub total_requests: AtomicU64,
    pub last_batch_size: AtomicU32,
    avg_latency_ms_bits: AtomicU64,
}

impl BatchCounters {
    pub fn avg_latency_ms(&self) -> f64 {
        f64::from_bits(self.avg_latency_ms_bits.load(Ordering::Relaxed))
    }

    /// Record one executed batch. Latency is folded into an exponential
    /// moving average (alpha = 0.3), seeded with the first raw sample.
    fn record(&self, batch_size: usize, elapsed: Duration) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.total_requests
            .fetch_add(batch_size as u64, Ordering::Relaxed);
        self.last_batch_size
            .store(batch_size as u32, Ordering::Relaxed);

        let latency_ms = elapsed.as_secs_f64() * 1000.0;
        let old = self.avg_latency_ms();
        let new = if old == 0.0 {
            latency_ms
        } else {
            old * 0.7 + latency_ms * 0.3
        };
        self.avg_latency_ms_bits
            .store(new.to_bits(), Ordering::Relaxed);
    }
}

/// The micro-batching engine. One per worker.
pub struct Batcher {
    cfg: BatcherConfig,
    queue: Arc<PriorityQueue>,
    executor: Arc<dyn Executor>,
    counters: Arc<BatchCounters>,
    wake: Notify,
    stop: Notify,
    stopping: AtomicBool,
    current_wait: Mutex<Duration>,
}

impl Batcher {
    pub fn new(cfg: BatcherConfig, queue: Arc<PriorityQueue>, executor: Arc<dyn Executor>) -> Self {
        let current_wait = Mutex::new(cfg.max_wait);
        Self {
            cfg,
            queue,
            executor,
            counters: Arc::new(BatchCounters::default()),
            wake: Notify::new(),
            stop: Notify::new(),
            stopping: AtomicBool::new(false),
            current_wait,
        }
    }

    pub fn counters(&self) -> Arc<BatchCounters> {
        self.counters.clone()
    }

    /// Spawn the batch loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let batcher = self.clone();
        tracing::info!(
            max_batch_size = batcher.cfg.max_batch_size,
            max_wait_ms = batcher.cfg.max_wait.as_millis() as u64,
            executor = batcher.executor.name(),
            "batcher started"
        );
        tokio::spawn(async move { batcher.run().await })
    }

    /// Wake the loop; new work is in the queue. Never blocks, further signals
    /// coalesce.
    pub fn signal(&self) {
        self.wake.notify_one();
    }

    /// Ask the loop to drain the queue and exit. Await the handle returned by
    /// [`Batcher::start`] to observe completion.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.stop.notify_waiters();
    }

    pub(crate) fn current_wait(&self) -> Duration {
        *self.current_wait.lock()
    }

    async fn run(&self) {
        loop {
            if self.stopping.load(Ordering::Acquire) {
                self.drain().await;
                return;
            }

            if self.queue.depth() == 0 {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = self.stop.notified() => {
                        self.drain().await;
                        return;
                    }
                }
            }

            let batch = self.collect().await;
            if batch.is_empty() {
                continue;
            }
            self.execute(batch).await;
        }
    }

    /// Gather one batch: flush immediately once a full batch is possible,
    /// otherwise flush whatever is present when the deadline fires. The
    /// deadline is never reset by new arrivals; a steady trickle must not
    /// starve it.
    async fn collect(&self) -> Vec<PendingRequest> {
        let wait = self.current_wait();
        let deadline = tokio::time::sleep(wait);
        tokio::pin!(deadline);

        loop {
            if self.queue.depth() >= self.cfg.max_batch_size
                || self.stopping.load(Ordering::Acquire)
            {
                return self.queue.dequeue_n(self.cfg.max_batch_size);
            }

            tokio::select! {
                _ = &mut deadline => {
                    return self.queue.dequeue_n(self.cfg.max_batch_size);
                }
                _ = self.wake.notified() => {
                    // Depth is re-checked at the top; keep the same deadline.
                }
                _ = self.stop.notified() => {
                    return self.queue.dequeue_n(self.cfg.max_batch_size);
                }
            }
        }
    }

    async fn execute(&self, batch: Vec<PendingRequest>) {
        let batch_size = batch.len();
        let payloads: Vec<Vec<u8>> = batch
            .iter()
            .map(|pending| pending.request.payload.clone())
            .collect();

        let start = Instant::now();
        let outcome = self.executor.execute_batch(&payloads).await;
        let elapsed = start.elapsed();

        self.counters.record(batch_size, elapsed);
        tracing::debug!(
            batch_size,
            latency_ms = elapsed.as_millis() as u64,
            "batch executed"
        );

        match outcome {
            Ok(results) if results.len() == batch_size => {
                for (pending, result) in batch.into_iter().zip(results) {
                    let queue_wait = start.saturating_duration_since(pending.enqueued_at);
                    let delivered = BatchedResult {
                        result,
                        latency_ns: elapsed.as_nanos() as i64,
                        batch_size: batch_size as i32,
                        queue_wait_ms: queue_wait.as_millis() as i32,
                        priority_used: pending.request.priority,
                    };
                    // Receiver may be gone (client cancelled); that is fine.
                    let _ = pending.response_tx.send(Ok(delivered));
                }
            }
            Ok(results) => {
                let message = format!(
                    "executor returned {} results for {} payloads",
                    results.len(),
                    batch_size
                );
                tracing::error!(%message, "dropping batch");
                for pending in batch {
                    let _ = pending
                        .response_tx
                        .send(Err(Error::Execution(message.clone())));
                }
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(batch_size, error = %message, "batch execution failed");
                for pending in batch {
                    let _ = pending
                        .response_tx
                        .send(Err(Error::Execution(message.clone())));
                }
            }
        }

        self.adapt_wait();
    }

    fn adapt_wait(&self) {
        let depth = self.queue.depth();
        let wait = if depth > self.cfg.high_pressure_depth {
            self.cfg.high_pressure_wait
        } else if depth < self.cfg.low_pressure_depth {
            self.cfg.low_pressure_wait
        } else {
            self.cfg.max_wait
        };
        *self.current_wait.lock() = wait;
    }

    async fn drain(&self) {
        loop {
            let batch = self.queue.dequeue_n(self.cfg.max_batch_size);
            if batch.is_empty() {
                tracing::info!("batcher drained");
                return;
            }
            self.execute(batch).await;
        }
    }
}
