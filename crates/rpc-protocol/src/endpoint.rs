//! Endpoint identity and the `service@host:port` key used by breakers and
//! adaptive timeouts to partition per-backend state.

use std::fmt;

/// A reachable network address exposing an RPC service.
///
/// Two endpoints with identical `(host, port)` are the same entity and
/// share all per-endpoint state (breaker, adaptive timeout, pool).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Build the `"service@host:port"` key under which a breaker and an
    /// adaptive timeout are registered.
    pub fn key(&self, service: &str) -> EndpointKey {
        EndpointKey(format!("{service}@{}:{}", self.host, self.port))
    }

    /// The `"host:port"` form used when talking to the external predictor.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Identity used by breakers and adaptive timeouts: `"<service>@<host>:<port>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
