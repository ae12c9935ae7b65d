//! Literal scenarios from the design's testable-properties list (§8) that
//! need more than one component wired together.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rpc_core::balancer::predictive::PredictiveBalancer;
use rpc_core::balancer::{BalancerFactory, LoadBalancer, MetricsSource, RandomBalancer};
use rpc_core::breaker::{BreakerConfig, BreakerRegistry, CircuitState};
use rpc_core::discovery::DiscoveryError;
use rpc_core::predictor::{Predictor, PredictorError};
use rpc_core::{Discovery, PoolConfig, PoolManager, Pipeline, RetryConfig, RpcError, TimeoutConfig, TimeoutRegistry};
use rpc_protocol::{Endpoint, SerializerKind};
use rpc_test_support::{EchoResponder, InMemoryDiscovery, MockRpcServer};

struct DecayPredictor {
    lambda: f64,
    latencies_ms: HashMap<String, f64>,
}

#[async_trait]
impl Predictor for DecayPredictor {
    async fn predict(&self, hosts: &[String]) -> Result<HashMap<String, f64>, PredictorError> {
        Ok(hosts
            .iter()
            .map(|h| {
                let latency = *self.latencies_ms.get(h).unwrap_or(&100.0);
                (h.clone(), (-self.lambda * latency).exp())
            })
            .collect())
    }
}

#[tokio::test]
async fn heterogeneous_latencies_favor_the_fast_endpoint() {
    let fast = Endpoint::new("fast", 1);
    let medium = Endpoint::new("medium", 2);
    let slow = Endpoint::new("slow", 3);
    let endpoints = vec![fast.clone(), medium.clone(), slow.clone()];

    let mut latencies_ms = HashMap::new();
    latencies_ms.insert(fast.host_port(), 10.0);
    latencies_ms.insert(medium.host_port(), 50.0);
    latencies_ms.insert(slow.host_port(), 200.0);
    let predictor = Arc::new(DecayPredictor { lambda: 0.02, latencies_ms });

    let balancer = PredictiveBalancer::spawn(predictor);
    let registry = BreakerRegistry::new(BreakerConfig::default());

    let mut counts: HashMap<Endpoint, u32> = HashMap::new();
    for _ in 0..10_000 {
        let picked = balancer.select("svc", &endpoints, &registry).await.unwrap();
        *counts.entry(picked).or_insert(0) += 1;
    }

    let fast_fraction = f64::from(*counts.get(&fast).unwrap_or(&0)) / 10_000.0;
    let slow_fraction = f64::from(*counts.get(&slow).unwrap_or(&0)) / 10_000.0;
    assert!(fast_fraction > 0.60, "fast endpoint fraction was {fast_fraction}");
    assert!(slow_fraction < 0.05, "slow endpoint fraction was {slow_fraction}");
}

#[tokio::test]
async fn all_open_breakers_fall_back_to_uniform_random() {
    let endpoints = vec![Endpoint::new("a", 1), Endpoint::new("b", 2), Endpoint::new("c", 3)];
    let balancer = RandomBalancer::new();
    let registry = BreakerRegistry::new(BreakerConfig::default());
    for e in &endpoints {
        registry.get_or_create(e.key("svc").as_str()).force_state(CircuitState::Open);
    }

    let mut counts: HashMap<Endpoint, u32> = HashMap::new();
    for _ in 0..1000 {
        let picked = balancer.select("svc", &endpoints, &registry).await.unwrap();
        *counts.entry(picked).or_insert(0) += 1;
    }
    for e in &endpoints {
        let c = *counts.get(e).unwrap_or(&0);
        assert!((250..=450).contains(&c), "{e} picked {c} times");
    }
}

#[tokio::test]
async fn open_endpoint_is_excluded_from_otherwise_healthy_pool() {
    let healthy_a = Endpoint::new("a", 1);
    let healthy_b = Endpoint::new("b", 2);
    let broken = Endpoint::new("c", 3);
    let endpoints = vec![healthy_a.clone(), healthy_b.clone(), broken.clone()];

    let balancer = RandomBalancer::new();
    let registry = BreakerRegistry::new(BreakerConfig::default());
    registry.get_or_create(broken.key("svc").as_str()).force_state(CircuitState::Open);

    let mut hits_broken = 0;
    for _ in 0..1000 {
        if balancer.select("svc", &endpoints, &registry).await == Some(broken.clone()) {
            hits_broken += 1;
        }
    }
    assert_eq!(hits_broken, 0);
}

struct CountingDiscovery {
    inner: InMemoryDiscovery,
    calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl Discovery for CountingDiscovery {
    async fn register(&self, service: &str, endpoint: Endpoint) -> Result<(), DiscoveryError> {
        self.inner.register(service, endpoint).await
    }
    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<(), DiscoveryError> {
        self.inner.deregister(service, endpoint).await
    }
    async fn discover(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.discover(service).await
    }
}

#[tokio::test]
async fn circuit_open_is_not_retried() {
    let backend = MockRpcServer::start(Arc::new(EchoResponder)).await.unwrap();
    let endpoint = Endpoint::new("127.0.0.1", backend.local_addr().port());

    let discovery = Arc::new(CountingDiscovery {
        inner: InMemoryDiscovery::new(),
        calls: std::sync::atomic::AtomicU32::new(0),
    });
    discovery.inner.seed("svc", vec![endpoint.clone()]);

    let balancer_factory = BalancerFactory::new();
    balancer_factory.register("random", Arc::new(RandomBalancer::new()));
    let balancer = balancer_factory.resolve(Some("random")).unwrap();

    let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::default()));
    breakers.get_or_create(endpoint.key("svc").as_str()).force_state(CircuitState::Open);
    let timeouts = Arc::new(TimeoutRegistry::new(TimeoutConfig::default()));
    let pools = Arc::new(PoolManager::new(
        PoolConfig { tls_verifier: None, ..PoolConfig::default() },
        SerializerKind::Protostuff,
    ));

    let pipeline = Pipeline::new(discovery.clone(), balancer, breakers, timeouts, pools, RetryConfig::default());
    let err = pipeline.call("svc", "echo", vec![], vec![]).await.unwrap_err();

    assert!(matches!(err, RpcError::CircuitOpen { .. }));
    assert_eq!(discovery.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
