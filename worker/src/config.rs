//! Configuration for the worker.

use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::batcher::BatcherConfig;

/// Worker configuration.
///
/// Sources, in order of precedence: environment variables
/// (`WORKER__SECTION__KEY`), `config.toml` if present, built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerIdentity,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerIdentity {
    #[serde(default = "default_worker_id")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_high_pressure_depth")]
    pub high_pressure_depth: usize,
    #[serde(default = "default_high_pressure_wait_ms")]
    pub high_pressure_wait_ms: u64,
    #[serde(default = "default_low_pressure_depth")]
    pub low_pressure_depth: usize,
    #[serde(default = "default_low_pressure_wait_ms")]
    pub low_pressure_wait_ms: u64,
}

impl BatchConfig {
    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            max_batch_size: self.max_batch_size.max(1),
            max_wait: Duration::from_millis(self.max_wait_ms),
            high_pressure_depth: self.high_pressure_depth,
            high_pressure_wait: Duration::from_millis(self.high_pressure_wait_ms),
            low_pressure_depth: self.low_pressure_depth,
            low_pressure_wait: Duration::from_millis(self.low_pressure_wait_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_kind")]
    pub kind: String,
    #[serde(default = "default_base_latency_ms")]
    pub base_latency_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_source")]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Defaults
fn default_worker_id() -> String {
    "worker-0".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    50052
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_max_batch_size() -> usize {
    32
}
fn default_max_wait_ms() -> u64 {
    50
}
fn default_high_pressure_depth() -> usize {
    100
}
fn default_high_pressure_wait_ms() -> u64 {
    20
}
fn default_low_pressure_depth() -> usize {
    10
}
fn default_low_pressure_wait_ms() -> u64 {
    80
}
fn default_executor_kind() -> String {
    "simulation".to_string()
}
fn default_base_latency_ms() -> u64 {
    5
}
fn default_telemetry_source() -> String {
    "auto".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkerIdentity {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_wait_ms: default_max_wait_ms(),
            high_pressure_depth: default_high_pressure_depth(),
            high_pressure_wait_ms: default_high_pressure_wait_ms(),
            low_pressure_depth: default_low_pressure_depth(),
            low_pressure_wait_ms: default_low_pressure_wait_ms(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: default_executor_kind(),
            base_latency_ms: default_base_latency_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            source: default_telemetry_source(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml (if present) and environment
    /// variables. Env var format: `WORKER__SECTION__KEY`.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("WORKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
