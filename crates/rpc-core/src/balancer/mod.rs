//! Component G: the load balancer (spec §4.6).
//!
//! [`LoadBalancer`] selects one endpoint out of the currently discovered set,
//! fusing an externally predicted weight with locally observed health. Two
//! implementations are registered by name: `"random"` and `"aipredictive"`.

pub mod predictive;
pub mod random;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use rpc_protocol::Endpoint;
use thiserror::Error;

use crate::breaker::{BreakerRegistry, CircuitState};

pub use predictive::PredictiveBalancer;
pub use random::RandomBalancer;

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("unknown load balancer strategy: {0}")]
    UnknownStrategy(String),
}

/// Local health signal for one endpoint, read from its breaker.
#[derive(Debug, Clone, Copy)]
pub struct LocalMetrics {
    pub breaker_state: CircuitState,
    pub failure_rate: f64,
    pub slow_call_rate: f64,
}

/// Source of [`LocalMetrics`] per endpoint key. Implemented by
/// [`BreakerRegistry`] so balancers don't depend on its concrete storage.
pub trait MetricsSource: Send + Sync {
    fn local_metrics(&self, endpoint_key: &str) -> LocalMetrics;
}

impl MetricsSource for BreakerRegistry {
    fn local_metrics(&self, endpoint_key: &str) -> LocalMetrics {
        let breaker = self.get_or_create(endpoint_key);
        let snap = breaker.snapshot();
        LocalMetrics {
            breaker_state: breaker.state(),
            failure_rate: snap.failure_rate(),
            slow_call_rate: snap.slow_call_rate(),
        }
    }
}

/// Scalar applied to a cached weight from breaker state and recent rates
/// (spec §4.6 step 5, computed identically for every strategy).
pub fn local_multiplier(m: LocalMetrics) -> f64 {
    let mut mult = 1.0;
    match m.breaker_state {
        CircuitState::Open => return 0.0,
        CircuitState::HalfOpen => mult *= 0.3,
        CircuitState::Closed => {}
    }
    if m.failure_rate > 50.0 {
        mult *= 0.2;
    } else if m.failure_rate > 20.0 {
        mult *= 0.5;
    } else if m.failure_rate > 10.0 {
        mult *= 0.8;
    }
    if m.slow_call_rate > 50.0 {
        mult *= 0.5;
    } else if m.slow_call_rate > 20.0 {
        mult *= 0.8;
    }
    mult
}

/// Draw one endpoint from its final weights via CDF sampling (spec §4.6
/// step 8), falling back to uniform random when every weight is zero.
pub fn weighted_sample(endpoints: &[Endpoint], weights: &[f64]) -> Option<Endpoint> {
    debug_assert_eq!(endpoints.len(), weights.len());
    if endpoints.is_empty() {
        return None;
    }
    if endpoints.len() == 1 {
        return Some(endpoints[0].clone());
    }

    let sum: f64 = weights.iter().sum();
    let mut rng = rand::thread_rng();
    if sum <= 0.0 {
        let idx = rng.gen_range(0..endpoints.len());
        return Some(endpoints[idx].clone());
    }

    let r: f64 = rng.gen_range(0.0..sum);
    let mut cumulative = 0.0;
    for (endpoint, weight) in endpoints.iter().zip(weights) {
        cumulative += weight;
        if cumulative > r {
            return Some(endpoint.clone());
        }
    }
    // Rounding corner case: last-bucket tie-break returns the final endpoint.
    endpoints.last().cloned()
}

/// Selects one endpoint out of `endpoints` for `service`, consulting
/// `metrics` for per-endpoint local health.
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    async fn select(&self, service: &str, endpoints: &[Endpoint], metrics: &dyn MetricsSource) -> Option<Endpoint>;
}

/// Process-wide registry of named balancer instances (spec §4.6
/// "Pluggability", §9 global-singleton note).
#[derive(Default)]
pub struct BalancerFactory {
    instances: DashMap<String, Arc<dyn LoadBalancer>>,
}

impl BalancerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named strategy, replacing any prior registration.
    pub fn register(&self, name: impl Into<String>, balancer: Arc<dyn LoadBalancer>) {
        self.instances.insert(name.into(), balancer);
    }

    /// Resolve a strategy by name. An empty/null name returns `"random"`;
    /// an unregistered non-empty name is a configuration error.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn LoadBalancer>, BalancerError> {
        let name = match name {
            None | Some("") => "random",
            Some(n) => n,
        };
        self.instances
            .get(name)
            .map(|e| e.clone())
            .ok_or_else(|| BalancerError::UnknownStrategy(name.to_owned()))
    }
}
