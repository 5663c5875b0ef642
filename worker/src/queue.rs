//! Priority-ordered request queue feeding the batcher.
//!
//! Ordering is (priority desc, client timestamp asc); a monotonically
//! increasing arrival sequence breaks remaining ties so dequeue order is
//! stable. The queue is unbounded; backpressure is expressed through worker
//! scoring on the router, not by rejection here.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use batchgate_common::{InferRequest, Priority};

use crate::error::Error;

/// Outcome delivered to a waiting request handler once its batch executes.
#[derive(Debug)]
pub struct BatchedResult {
    pub result: Vec<u8>,
    pub latency_ns: i64,
    pub batch_size: i32,
    pub queue_wait_ms: i32,
    pub priority_used: Priority,
}

/// A request parked in the queue until the batcher picks it up.
///
/// The handler holds the receiving half of `response_tx` and may drop it on
/// client disconnect; the batcher's send is fire-and-forget either way.
pub struct PendingRequest {
    pub request: InferRequest,
    pub response_tx: oneshot::Sender<Result<BatchedResult, Error>>,
    pub enqueued_at: Instant,
    seq: u64,
}

impl PendingRequest {
    fn priority(&self) -> Priority {
        self.request.priority
    }
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingRequest {}

impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingRequest {
    // Max-heap order: higher priority wins, then earlier timestamp, then
    // earlier arrival.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority()
            .cmp(&other.priority())
            .then_with(|| other.request.timestamp.cmp(&self.request.timestamp))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<PendingRequest>,
    next_seq: u64,
}

/// Thread-safe priority queue. Enqueue always succeeds.
#[derive(Default)]
pub struct PriorityQueue {
    inner: Mutex<QueueInner>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request and return the receiver its outcome will arrive on.
    pub fn enqueue(
        &self,
        request: InferRequest,
    ) -> oneshot::Receiver<Result<BatchedResult, Error>> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(PendingRequest {
            request,
            response_tx: tx,
            enqueued_at: Instant::now(),
            seq,
        });
        rx
    }

    /// Atomically remove up to `n` front items. Returns fewer if the queue
    /// holds fewer, and an empty vec if it is empty.
    pub fn dequeue_n(&self, n: usize) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock();
        let count = n.min(inner.heap.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            match inner.heap.pop() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    /// Current size. Advisory: may be stale by the time the caller acts.
    pub fn depth(&self) -> usize {
        self.inner.lock().heap.len()
    }
}
