//! Wires discovery, load balancing, circuit breaking, adaptive timeout, and
//! retries into one end-to-end call pipeline against an in-process mock
//! backend, then issues a handful of calls and reports what happened.

use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command};
use rpc_core::balancer::{BalancerFactory, RandomBalancer};
use rpc_core::{
    BreakerConfig, BreakerRegistry, CoreConfig, Pipeline, PoolConfig, PoolManager, RetryConfig, TimeoutConfig,
    TimeoutRegistry,
};
use rpc_protocol::{Endpoint, SerializerKind};
use rpc_test_support::{EchoResponder, InMemoryDiscovery, MockRpcServer};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rpc-demo starting");

    let matches = Command::new("rpc-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drives the resilience core's call pipeline against an in-process mock backend")
        .arg(
            Arg::new("calls")
                .help("Number of calls to issue")
                .short('n')
                .long("calls")
                .value_parser(clap::value_parser!(u32))
                .default_value("5"),
        )
        .arg(
            Arg::new("config")
                .help("Path to a rpc.toml config file; falls back to documented defaults")
                .short('c')
                .long("config"),
        )
        .get_matches();
    let calls = *matches.get_one::<u32>("calls").expect("has a default");

    let core_config = match matches.get_one::<String>("config") {
        Some(path) => CoreConfig::from_path(std::path::Path::new(path)).expect("config file parses"),
        None => CoreConfig::default(),
    };
    info!(
        registry_address = %core_config.registry_address,
        loadbalancer_type = %core_config.loadbalancer_type,
        client_request_timeout_seconds = core_config.client_request_timeout_seconds,
        "resolved configuration"
    );

    // A plaintext mock backend stands in for a real RPC service.
    let backend = MockRpcServer::start(Arc::new(EchoResponder)).await.expect("mock backend binds");
    let endpoint = Endpoint::new("127.0.0.1", backend.local_addr().port());
    info!(%endpoint, "mock backend listening");

    let discovery = Arc::new(InMemoryDiscovery::new());
    discovery.seed("demo.EchoService", vec![endpoint]);

    // Only the baseline strategy is registered here: reaching "aipredictive"
    // would mean standing up a real prediction service for this demo to call.
    let balancer_factory = BalancerFactory::new();
    balancer_factory.register("random", Arc::new(RandomBalancer::new()));
    let requested_strategy = if core_config.loadbalancer_type == "aipredictive" {
        info!("no prediction service configured for this demo, falling back to \"random\"");
        "random"
    } else {
        core_config.loadbalancer_type.as_str()
    };
    let balancer = balancer_factory.resolve(Some(requested_strategy)).expect("random is registered");

    let breakers = Arc::new(BreakerRegistry::new(BreakerConfig::default()));
    let timeout_config = TimeoutConfig {
        default_timeout: Duration::from_secs(core_config.client_request_timeout_seconds),
        ..Default::default()
    };
    let timeouts = Arc::new(TimeoutRegistry::new(timeout_config));
    let pools = Arc::new(PoolManager::new(
        PoolConfig { tls_verifier: None, ..PoolConfig::default() },
        SerializerKind::Protostuff,
    ));

    let pipeline = Pipeline::new(discovery, balancer, breakers, timeouts, pools, RetryConfig::default());

    for i in 0..calls {
        let params = vec![serde_json::json!(format!("ping-{i}"))];
        match pipeline.call("demo.EchoService", "echo", vec!["java.lang.String".into()], params).await {
            Ok(result) => info!(call = i, %result, "call succeeded"),
            Err(err) => tracing::warn!(call = i, %err, "call failed"),
        }
    }

    info!("rpc-demo finished");
}
