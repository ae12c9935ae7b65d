//! The `"random"` strategy: no external prediction, just locally fused
//! health weights (spec §4.6, cached weight fixed at 1.0 for every endpoint).

use async_trait::async_trait;
use rpc_protocol::Endpoint;

use super::{local_multiplier, weighted_sample, LoadBalancer, MetricsSource};

#[derive(Debug, Default)]
pub struct RandomBalancer;

impl RandomBalancer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LoadBalancer for RandomBalancer {
    async fn select(&self, service: &str, endpoints: &[Endpoint], metrics: &dyn MetricsSource) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        if endpoints.len() == 1 {
            return Some(endpoints[0].clone());
        }

        let weights: Vec<f64> = endpoints
            .iter()
            .map(|e| {
                let key = e.key(service);
                local_multiplier(metrics.local_metrics(key.as_str()))
            })
            .collect();

        weighted_sample(endpoints, &weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerRegistry;

    #[tokio::test]
    async fn single_endpoint_is_returned_without_sampling() {
        let balancer = RandomBalancer::new();
        let registry = BreakerRegistry::default();
        let endpoints = vec![Endpoint::new("a", 1)];
        let picked = balancer.select("svc", &endpoints, &registry).await;
        assert_eq!(picked, Some(endpoints[0].clone()));
    }

    #[tokio::test]
    async fn excludes_endpoint_with_open_breaker() {
        let balancer = RandomBalancer::new();
        let registry = BreakerRegistry::default();
        let endpoints = vec![Endpoint::new("a", 1), Endpoint::new("b", 2)];
        let open_key = endpoints[0].key("svc");
        registry.get_or_create(open_key.as_str()).force_state(crate::breaker::CircuitState::Open);

        let mut hits_a = 0;
        for _ in 0..200 {
            if balancer.select("svc", &endpoints, &registry).await == Some(endpoints[0].clone()) {
                hits_a += 1;
            }
        }
        assert_eq!(hits_a, 0);
    }
}
