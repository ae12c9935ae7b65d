//! The `"aipredictive"` strategy: cached weights refreshed from an external
//! predictor, fused with local health (spec §4.6).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rpc_protocol::Endpoint;
use tracing::warn;

use super::{local_multiplier, weighted_sample, LoadBalancer, MetricsSource};
use crate::predictor::Predictor;

const INITIAL_DELAY: Duration = Duration::from_secs(5);
const REFRESH_PERIOD: Duration = Duration::from_secs(10);

pub struct PredictiveBalancer {
    predictor: Arc<dyn Predictor>,
    weight_cache: Arc<ArcSwap<HashMap<String, f64>>>,
    known_addresses: Arc<Mutex<Vec<Endpoint>>>,
}

impl PredictiveBalancer {
    /// Constructs the balancer and spawns its background refresh task
    /// (initial delay 5s, period 10s, spec §4.6 "State").
    pub fn spawn(predictor: Arc<dyn Predictor>) -> Arc<Self> {
        let this = Arc::new(Self {
            predictor,
            weight_cache: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            known_addresses: Arc::new(Mutex::new(Vec::new())),
        });

        let task_self = this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(INITIAL_DELAY).await;
            loop {
                task_self.refresh_once().await;
                tokio::time::sleep(REFRESH_PERIOD).await;
            }
        });

        this
    }

    fn publish_known(&self, endpoints: &[Endpoint]) {
        *self.known_addresses.lock().unwrap() = endpoints.to_vec();
    }

    async fn refresh_once(&self) {
        let known = self.known_addresses.lock().unwrap().clone();
        if known.is_empty() {
            return;
        }
        let hosts: Vec<String> = known.iter().map(Endpoint::host_port).collect();

        match self.predictor.predict(&hosts).await {
            Ok(scores) => {
                let mut map = HashMap::with_capacity(known.len());
                for host in &hosts {
                    map.insert(host.clone(), *scores.get(host).unwrap_or(&1.0));
                }
                self.weight_cache.store(Arc::new(map));
            }
            Err(err) => {
                warn!(%err, "predictor refresh failed, falling back to uniform weights");
                let map = hosts.into_iter().map(|h| (h, 1.0)).collect();
                self.weight_cache.store(Arc::new(map));
            }
        }
    }
}

#[async_trait]
impl LoadBalancer for PredictiveBalancer {
    async fn select(&self, service: &str, endpoints: &[Endpoint], metrics: &dyn MetricsSource) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        if endpoints.len() == 1 {
            return Some(endpoints[0].clone());
        }

        self.publish_known(endpoints);

        let mut cache = self.weight_cache.load_full();
        if cache.is_empty() {
            // First-call warmup: fetch synchronously rather than waiting for
            // the next scheduled tick.
            self.refresh_once().await;
            cache = self.weight_cache.load_full();
        }

        let weights: Vec<f64> = endpoints
            .iter()
            .map(|e| {
                let cached = *cache.get(&e.host_port()).unwrap_or(&1.0);
                let key = e.key(service);
                cached * local_multiplier(metrics.local_metrics(key.as_str()))
            })
            .collect();

        weighted_sample(endpoints, &weights)
    }
}
