//! Shared router state and routing counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::registry::Registry;

/// Monotonic per-worker served counters plus the global total. The worker
/// set is fixed at startup, so the map itself is immutable and only the
/// atomics move.
pub struct RoutingStats {
    total: AtomicU64,
    per_worker: HashMap<String, AtomicU64>,
}

impl RoutingStats {
    pub fn new(endpoints: &[String]) -> Self {
        Self {
            total: AtomicU64::new(0),
            per_worker: endpoints
                .iter()
                .map(|addr| (addr.clone(), AtomicU64::new(0)))
                .collect(),
        }
    }

    pub fn record_request(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self, address: &str) {
        if let Some(counter) = self.per_worker.get(address) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn served(&self, address: &str) -> u64 {
        self.per_worker
            .get(address)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn distribution(&self) -> HashMap<String, u64> {
        self.per_worker
            .iter()
            .map(|(addr, counter)| (addr.clone(), counter.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Shared state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub stats: RoutingStats,
    pub broadcaster: Broadcaster,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_worker() {
        let endpoints = vec!["a:1".to_string(), "b:1".to_string()];
        let stats = RoutingStats::new(&endpoints);

        stats.record_request();
        stats.record_request();
        stats.record_served("a:1");
        stats.record_served("a:1");
        stats.record_served("b:1");
        stats.record_served("unknown:1");

        assert_eq!(stats.total(), 2);
        assert_eq!(stats.served("a:1"), 2);
        assert_eq!(stats.served("b:1"), 1);
        assert_eq!(stats.served("unknown:1"), 0);

        let distribution = stats.distribution();
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution["a:1"], 2);
    }
}
