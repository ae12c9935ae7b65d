//! Shared test fixtures for the RPC resilience core.

pub mod discovery;
pub mod mock_backend;
pub mod mock_predictor;

pub use discovery::InMemoryDiscovery;
pub use mock_backend::{DelayedResponder, EchoResponder, MockOutcome, MockResponder, MockRpcServer};
pub use mock_predictor::MockPredictorServer;
