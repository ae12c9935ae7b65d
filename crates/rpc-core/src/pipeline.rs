//! Component H: the transport-neutral call pipeline tying discovery,
//! balancing, circuit breaking, pooling, and retries together (spec §4.7).

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use rpc_protocol::message::{Body, Request as WireRequest};
use rpc_protocol::Endpoint;
use serde_json::Value;
use tracing::{debug, warn};

use crate::balancer::LoadBalancer;
use crate::breaker::BreakerRegistry;
use crate::discovery::Discovery;
use crate::error::{RpcError, RpcResult};
use crate::pool::PoolManager;
use crate::retry::RetryConfig;
use crate::timeout::TimeoutRegistry;

/// Wires every component into a single `call` entry point.
pub struct Pipeline {
    discovery: Arc<dyn Discovery>,
    balancer: Arc<dyn LoadBalancer>,
    breakers: Arc<BreakerRegistry>,
    timeouts: Arc<TimeoutRegistry>,
    pools: Arc<PoolManager>,
    retry: RetryConfig,
}

impl Pipeline {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        balancer: Arc<dyn LoadBalancer>,
        breakers: Arc<BreakerRegistry>,
        timeouts: Arc<TimeoutRegistry>,
        pools: Arc<PoolManager>,
        retry: RetryConfig,
    ) -> Self {
        Self { discovery, balancer, breakers, timeouts, pools, retry }
    }

    /// `(service, method, paramTypes, args)`, wrapped in the retry loop
    /// (spec §4.7 "Retry loop around the above").
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        param_types: Vec<String>,
        params: Vec<Value>,
    ) -> RpcResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt_once(service, method, &param_types, &params).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if err.is_circuit_open() {
                        return Err(err);
                    }
                    let retryable = err.is_retryable(self.retry.retry_on_timeout);
                    if !retryable || attempt + 1 >= self.retry.max_attempts {
                        return Err(RpcError::RetryExhausted { attempts: attempt + 1, source: Box::new(err) });
                    }
                    let delay = self.retry.calculate_delay(attempt);
                    debug!(attempt, ?delay, %err, "retrying call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        service: &str,
        method: &str,
        param_types: &[String],
        params: &[Value],
    ) -> RpcResult<Value> {
        // Step 1: discover.
        let endpoints = self
            .discovery
            .discover(service)
            .await
            .map_err(|e| RpcError::ConnectionRefused(format!("discovery: {e}")))?;
        if endpoints.is_empty() {
            return Err(RpcError::NoProvider { service: service.to_owned() });
        }

        // Step 2: select.
        let endpoint: Endpoint = self
            .balancer
            .select(service, &endpoints, self.breakers.as_ref())
            .await
            .ok_or_else(|| RpcError::NoProvider { service: service.to_owned() })?;

        // Step 3: per-endpoint breaker + adaptive timeout.
        let key = endpoint.key(service);
        let breaker = self.breakers.get_or_create(key.as_str());
        let adaptive_timeout = self.timeouts.get_or_create(key.as_str());

        // Step 4: admission.
        if !breaker.allow_request() {
            return Err(RpcError::CircuitOpen { endpoint_key: key.as_str().to_owned() });
        }

        // Step 5: acquire a connection (always returned to the pool on drop).
        let pool = self.pools.pool_for(&endpoint, &key);
        let conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                breaker.record_failure();
                return Err(err);
            }
        };

        // Step 6: register + send.
        let request_id = format!("{service}.{method}-{:x}", rand::thread_rng().gen::<u32>());
        let wire_request = WireRequest {
            request_id,
            class_name: service.to_owned(),
            method_name: method.to_owned(),
            param_types: param_types.to_vec(),
            params: params.to_vec(),
            heartbeat: false,
        };
        let (msg_id, rx) = conn.correlation().register();
        let framed = rpc_protocol::FramedMessage::request(msg_id, conn.serializer(), wire_request);
        if let Err(err) = conn.send(framed) {
            breaker.record_failure();
            return Err(err);
        }

        // Step 7: await with the adaptive deadline.
        let deadline = adaptive_timeout.current();
        let started = Instant::now();
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(response_msg)) => {
                let elapsed = started.elapsed();
                match response_msg.body {
                    Body::Response(response) => {
                        if let Some(remote_err) = response.error {
                            breaker.record_failure();
                            Err(RpcError::Business { class_name: remote_err.class_name, message: remote_err.message })
                        } else {
                            breaker.record_success(elapsed);
                            adaptive_timeout.record(elapsed);
                            Ok(response.result.unwrap_or(Value::Null))
                        }
                    }
                    Body::Request(_) => {
                        breaker.record_failure();
                        Err(RpcError::ProtocolViolation(rpc_protocol::ProtocolError::Deserialize(
                            "expected a response body".to_owned(),
                        )))
                    }
                }
            }
            Ok(Err(_recv_dropped)) => {
                breaker.record_failure();
                Err(RpcError::ConnectionRefused(format!("{endpoint} closed before responding")))
            }
            Err(_elapsed) => {
                conn.correlation().cancel(msg_id);
                breaker.record_failure();
                warn!(%endpoint, ?deadline, "call timed out");
                Err(RpcError::Timeout { elapsed_ms: deadline.as_millis() as u64 })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::RandomBalancer;
    use crate::breaker::BreakerConfig;
    use crate::discovery::DiscoveryError;
    use crate::pool::PoolConfig;
    use crate::timeout::TimeoutConfig;
    use async_trait::async_trait;

    struct EmptyDiscovery;

    #[async_trait]
    impl Discovery for EmptyDiscovery {
        async fn register(&self, _service: &str, _endpoint: Endpoint) -> Result<(), DiscoveryError> {
            Ok(())
        }
        async fn deregister(&self, _service: &str, _endpoint: &Endpoint) -> Result<(), DiscoveryError> {
            Ok(())
        }
        async fn discover(&self, _service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
            Ok(vec![])
        }
    }

    fn pipeline_with_empty_discovery() -> Pipeline {
        Pipeline::new(
            Arc::new(EmptyDiscovery),
            Arc::new(RandomBalancer::new()),
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
            Arc::new(TimeoutRegistry::new(TimeoutConfig::default())),
            Arc::new(PoolManager::new(PoolConfig::default(), rpc_protocol::SerializerKind::Protostuff)),
            RetryConfig { max_attempts: 2, ..Default::default() },
        )
    }

    #[tokio::test]
    async fn empty_discovery_fails_with_no_provider_without_retry() {
        let pipeline = pipeline_with_empty_discovery();
        let err = pipeline.call("svc", "method", vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::RetryExhausted { .. }));
    }
}
