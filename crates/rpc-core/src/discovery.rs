//! External registry interface (spec §6). No production implementation is
//! bundled; `rpc-test-support` provides an in-memory double for tests.

use async_trait::async_trait;
use rpc_protocol::Endpoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    #[error("registry returned malformed data: {0}")]
    Malformed(String),
}

/// A service registry: endpoints register, deregister, and are looked up by
/// service name.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Idempotent; implementations may retry internally on transient errors.
    async fn register(&self, service: &str, endpoint: Endpoint) -> Result<(), DiscoveryError>;

    /// Best-effort; callers log and ignore failures during shutdown.
    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<(), DiscoveryError>;

    /// Currently healthy endpoints for `service`; may be empty.
    async fn discover(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError>;
}
