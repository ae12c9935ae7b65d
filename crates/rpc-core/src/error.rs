//! Behavioral error taxonomy (spec §7).
//!
//! The retry wrapper only ever matches on [`RpcError::is_retryable`]; it never
//! inspects the underlying cause's concrete type.

use rpc_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Discovery returned an empty endpoint list.
    #[error("no provider available for service {service}")]
    NoProvider { service: String },

    /// Admission refused by the circuit breaker. Never retried.
    #[error("circuit open for endpoint key {endpoint_key}")]
    CircuitOpen { endpoint_key: String },

    /// Deadline elapsed waiting for a response.
    #[error("call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Transport could not connect.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other I/O failure (reset, broken pipe, etc).
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// The response carried an application-level error. Never retried.
    #[error("business error: {class_name}: {message}")]
    Business { class_name: String, message: String },

    /// Bad magic / truncated frame; the connection is closed. Never retried.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[source] ProtocolError),

    /// All retry attempts were exhausted; carries the last cause.
    #[error("retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<RpcError>,
    },
}

impl RpcError {
    /// Classification per spec §4.8 `isRetryable`. Walks the `source()` chain
    /// recursively so a wrapped cause is classified the same as a bare one.
    pub fn is_retryable(&self, retry_on_timeout: bool) -> bool {
        match self {
            RpcError::CircuitOpen { .. } => false,
            RpcError::ConnectionRefused(_) => true,
            RpcError::Io(_) => true,
            RpcError::Timeout { .. } => retry_on_timeout,
            RpcError::NoProvider { .. } => false,
            RpcError::Business { .. } => false,
            RpcError::ProtocolViolation(_) => false,
            RpcError::RetryExhausted { source, .. } => source.is_retryable(retry_on_timeout),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RpcError::CircuitOpen { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
