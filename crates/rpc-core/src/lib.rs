//! Client-side resilience and routing core for a transport-neutral RPC
//! pipeline: a predictive load balancer, a per-endpoint circuit breaker, an
//! adaptive timeout, and a smart retry wrapper, all driven by the wire
//! protocol in `rpc-protocol`.

pub mod balancer;
pub mod breaker;
pub mod config;
pub mod correlation;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod predictor;
pub mod retry;
pub mod timeout;
pub mod tls;

pub use breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use config::CoreConfig;
pub use correlation::CorrelationTable;
pub use discovery::{Discovery, DiscoveryError};
pub use error::{RpcError, RpcResult};
pub use pipeline::Pipeline;
pub use pool::{Pool, PoolConfig, PoolManager, PooledConnection};
pub use predictor::{HttpPredictor, Predictor, PredictorError};
pub use retry::{JitterStrategy, RetryConfig};
pub use timeout::{AdaptiveTimeout, TimeoutConfig, TimeoutRegistry};
