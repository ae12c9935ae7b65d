//! In-memory [`Discovery`] double.

use async_trait::async_trait;
use dashmap::DashMap;
use rpc_core::discovery::{Discovery, DiscoveryError};
use rpc_protocol::Endpoint;

#[derive(Default)]
pub struct InMemoryDiscovery {
    services: DashMap<String, Vec<Endpoint>>,
}

impl InMemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service with a fixed endpoint list, bypassing `register`.
    pub fn seed(&self, service: impl Into<String>, endpoints: Vec<Endpoint>) {
        self.services.insert(service.into(), endpoints);
    }
}

#[async_trait]
impl Discovery for InMemoryDiscovery {
    async fn register(&self, service: &str, endpoint: Endpoint) -> Result<(), DiscoveryError> {
        let mut entry = self.services.entry(service.to_owned()).or_default();
        if !entry.contains(&endpoint) {
            entry.push(endpoint);
        }
        Ok(())
    }

    async fn deregister(&self, service: &str, endpoint: &Endpoint) -> Result<(), DiscoveryError> {
        if let Some(mut entry) = self.services.get_mut(service) {
            entry.retain(|e| e != endpoint);
        }
        Ok(())
    }

    async fn discover(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        Ok(self.services.get(service).map(|e| e.clone()).unwrap_or_default())
    }
}
