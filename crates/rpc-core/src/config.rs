//! Process-level configuration surface (spec §6 "Configuration surface").
//!
//! TOML is the sole config source, following the forwarder's `Raw*`
//! shadow-struct pattern: every field is optional in the raw form and
//! defaulted while building the public [`CoreConfig`].

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration for the resilience/routing core. Per-endpoint
/// breaker, adaptive-timeout, pool, and retry tuning are not part of this
/// process-level surface (spec §6's table names exactly these four keys);
/// set them via `BreakerConfig`/`TimeoutConfig`/`PoolConfig`/`RetryConfig`
/// directly when constructing a `Pipeline`.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub registry_address: String,
    pub loadbalancer_type: String,
    pub loadbalancer_ai_service_url: String,
    pub client_request_timeout_seconds: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            registry_address: "127.0.0.1:8848".to_owned(),
            loadbalancer_type: "aipredictive".to_owned(),
            loadbalancer_ai_service_url: "http://localhost:8000/predict".to_owned(),
            client_request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    rpc: Option<RawRpc>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRpc {
    registry: Option<RawRegistry>,
    loadbalancer: Option<RawLoadBalancer>,
    client: Option<RawClient>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRegistry {
    address: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLoadBalancer {
    #[serde(rename = "type")]
    kind: Option<String>,
    ai: Option<RawAi>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAi {
    service: Option<RawAiService>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAiService {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawClient {
    request: Option<RawRequest>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRequest {
    #[serde(rename = "timeout-seconds")]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl CoreConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
        Self::from_str(&toml_str)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(toml_str)?;
        let defaults = Self::default();
        let rpc = raw.rpc.unwrap_or_default();

        Ok(Self {
            registry_address: rpc
                .registry
                .and_then(|r| r.address)
                .unwrap_or(defaults.registry_address),
            loadbalancer_type: rpc
                .loadbalancer
                .as_ref()
                .and_then(|lb| lb.kind.clone())
                .unwrap_or(defaults.loadbalancer_type),
            loadbalancer_ai_service_url: rpc
                .loadbalancer
                .and_then(|lb| lb.ai)
                .and_then(|ai| ai.service)
                .and_then(|s| s.url)
                .unwrap_or(defaults.loadbalancer_ai_service_url),
            client_request_timeout_seconds: rpc
                .client
                .and_then(|c| c.request)
                .and_then(|r| r.timeout_seconds)
                .unwrap_or(defaults.client_request_timeout_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_documented_defaults() {
        let cfg = CoreConfig::from_str("").unwrap();
        assert_eq!(cfg.registry_address, "127.0.0.1:8848");
        assert_eq!(cfg.loadbalancer_type, "aipredictive");
        assert_eq!(cfg.loadbalancer_ai_service_url, "http://localhost:8000/predict");
        assert_eq!(cfg.client_request_timeout_seconds, 10);
    }

    #[test]
    fn partial_overrides_apply() {
        let toml_str = r#"
            [rpc.loadbalancer]
            type = "random"

            [rpc.client.request]
            timeout-seconds = 30
        "#;
        let cfg = CoreConfig::from_str(toml_str).unwrap();
        assert_eq!(cfg.loadbalancer_type, "random");
        assert_eq!(cfg.client_request_timeout_seconds, 30);
        assert_eq!(cfg.registry_address, "127.0.0.1:8848");
    }
}
