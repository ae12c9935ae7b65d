//! Component F: adaptive per-endpoint timeout derived from recent latency
//! percentiles (spec §4.5).

use std::time::Duration;

use dashmap::DashMap;

use crate::metrics::LatencyWindow;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub percentile: f64,
    pub multiplier: f64,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    pub minimum_samples: usize,
    pub default_timeout: Duration,
    pub window_capacity: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            percentile: 0.99,
            multiplier: 1.5,
            min_timeout: Duration::from_millis(100),
            max_timeout: Duration::from_millis(30_000),
            minimum_samples: 20,
            default_timeout: Duration::from_millis(10_000),
            window_capacity: 1000,
        }
    }
}

/// Tracks recent latencies for one endpoint and derives the next timeout.
#[derive(Debug)]
pub struct AdaptiveTimeout {
    config: TimeoutConfig,
    latencies: LatencyWindow,
}

impl AdaptiveTimeout {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { latencies: LatencyWindow::new(config.window_capacity), config }
    }

    pub fn record(&self, latency: Duration) {
        self.latencies.record(latency.as_millis() as u64);
    }

    /// Derive the timeout to apply to the next call: `default_timeout` until
    /// `minimum_samples` observations exist, then
    /// `clamp(percentile * multiplier, min, max)`.
    pub fn current(&self) -> Duration {
        if self.latencies.count() < self.config.minimum_samples {
            return self.config.default_timeout;
        }
        let Some(p) = self.latencies.percentile(self.config.percentile) else {
            return self.config.default_timeout;
        };
        let scaled = (p as f64 * self.config.multiplier).round() as u64;
        Duration::from_millis(scaled).clamp(self.config.min_timeout, self.config.max_timeout)
    }
}

/// Process-wide registry, one [`AdaptiveTimeout`] per endpoint key.
#[derive(Debug, Default)]
pub struct TimeoutRegistry {
    config: TimeoutConfig,
    timeouts: DashMap<String, std::sync::Arc<AdaptiveTimeout>>,
}

impl TimeoutRegistry {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config, timeouts: DashMap::new() }
    }

    pub fn get_or_create(&self, endpoint_key: &str) -> std::sync::Arc<AdaptiveTimeout> {
        self.timeouts
            .entry(endpoint_key.to_owned())
            .or_insert_with(|| std::sync::Arc::new(AdaptiveTimeout::new(self.config)))
            .clone()
    }
}
