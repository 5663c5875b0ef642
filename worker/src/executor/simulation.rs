//! Simulated GPU executor.
//!
//! Mimics batched inference with a latency model that grows sublinearly with
//! batch size, plus a small amount of real CPU work so the process shows load
//! under profiling. Satisfies the same order/length contract as a real
//! backend.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;

use super::Executor;
use crate::error::{Error, Result};

const CLASSES: [&str; 8] = [
    "cat", "dog", "car", "tree", "person", "building", "bird", "fish",
];

pub struct SimulatedGpu {
    base_latency: Duration,
}

impl SimulatedGpu {
    pub fn new(base_latency_ms: u64) -> Self {
        let base_latency_ms = if base_latency_ms == 0 { 5 } else { base_latency_ms };
        Self {
            base_latency: Duration::from_millis(base_latency_ms),
        }
    }
}

#[async_trait]
impl Executor for SimulatedGpu {
    fn name(&self) -> &'static str {
        "simulation"
    }

    async fn execute_batch(&self, payloads: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let batch_size = payloads.len();
        if batch_size == 0 {
            return Err(Error::Execution("empty batch".to_string()));
        }

        // Kernel time: fixed launch cost plus ~1.5ms per item.
        let latency =
            self.base_latency + Duration::from_micros(1500).saturating_mul(batch_size as u32);

        matrix_work(64);
        tokio::time::sleep(latency).await;

        let mut rng = rand::rng();
        let mut results = Vec::with_capacity(batch_size);
        for position in 0..batch_size {
            let result = json!({
                "class": CLASSES[rng.random_range(0..CLASSES.len())],
                "confidence": 0.7 + rng.random::<f64>() * 0.29,
                "simulated": true,
                "batch_pos": position,
            });
            results.push(result.to_string().into_bytes());
        }
        Ok(results)
    }
}

/// NxN matrix multiply; keeps the simulated executor from being pure sleep.
fn matrix_work(n: usize) {
    let mut rng = rand::rng();
    let a: Vec<f64> = (0..n * n).map(|_| rng.random()).collect();
    let b: Vec<f64> = (0..n * n).map(|_| rng.random()).collect();
    let mut c = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += a[i * n + k] * b[k * n + j];
            }
            c[i * n + j] = sum;
        }
    }
    std::hint::black_box(c[0].sqrt());
}
