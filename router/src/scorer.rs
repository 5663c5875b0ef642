//! Routing score for a worker telemetry snapshot. Pure function; higher is
//! better.

use serde::Deserialize;

use batchgate_common::WorkerTelemetry;

/// Sentinel for unhealthy or missing telemetry. Workers at this score are
/// excluded from selection entirely.
pub const EXCLUDED_SCORE: f64 = -1000.0;

/// Scoring weights. Free-VRAM headroom is the primary admission signal;
/// queue depth and latency contribute linearly with low weight; utilization
/// at 100% costs half the VRAM range; the thermal step penalty models
/// imminent throttling.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_vram_weight")]
    pub vram_weight: f64,
    #[serde(default = "default_queue_divisor")]
    pub queue_divisor: f64,
    #[serde(default = "default_latency_divisor")]
    pub latency_divisor: f64,
    #[serde(default = "default_utilization_weight")]
    pub utilization_weight: f64,
    #[serde(default = "default_temperature_threshold_c")]
    pub temperature_threshold_c: f64,
    #[serde(default = "default_temperature_penalty")]
    pub temperature_penalty: f64,
}

fn default_vram_weight() -> f64 {
    100.0
}
fn default_queue_divisor() -> f64 {
    10.0
}
fn default_latency_divisor() -> f64 {
    10.0
}
fn default_utilization_weight() -> f64 {
    50.0
}
fn default_temperature_threshold_c() -> f64 {
    80.0
}
fn default_temperature_penalty() -> f64 {
    50.0
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            vram_weight: default_vram_weight(),
            queue_divisor: default_queue_divisor(),
            latency_divisor: default_latency_divisor(),
            utilization_weight: default_utilization_weight(),
            temperature_threshold_c: default_temperature_threshold_c(),
            temperature_penalty: default_temperature_penalty(),
        }
    }
}

/// Score one worker from its cached telemetry.
pub fn score(telemetry: Option<&WorkerTelemetry>, weights: &ScoreWeights) -> f64 {
    let Some(t) = telemetry else {
        return EXCLUDED_SCORE;
    };
    if !t.healthy {
        return EXCLUDED_SCORE;
    }

    let mut score = 0.0;

    // Memory headroom, 0..=vram_weight points.
    if t.vram_total_gb > 0.0 {
        score += (t.vram_free_gb / t.vram_total_gb) * weights.vram_weight;
    }

    score -= t.queue_depth as f64 / weights.queue_divisor;
    score -= t.avg_latency_ms / weights.latency_divisor;
    score -= (t.gpu_utilization / 100.0) * weights.utilization_weight;

    if t.temperature_c > weights.temperature_threshold_c {
        score -= weights.temperature_penalty;
    }

    score
}
