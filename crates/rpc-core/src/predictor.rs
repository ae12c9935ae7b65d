//! External health predictor interface (spec §4.6, §6).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("predictor returned HTTP {0}")]
    Status(u16),
}

/// Queries an external service for per-endpoint health weights.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// `hosts` are `"host:port"` strings. Returns a map with an entry for
    /// every host the predictor chose to score; callers default the rest to
    /// `1.0`. Any failure here makes the caller fall back to uniform weights.
    async fn predict(&self, hosts: &[String]) -> Result<HashMap<String, f64>, PredictorError>;
}

/// POSTs the host list as JSON to a configured URL and parses a JSON object
/// of `"host:port" -> weight` back (spec §6 "Prediction interface").
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client config is valid");
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, hosts: &[String]) -> Result<HashMap<String, f64>, PredictorError> {
        let response = self.client.post(&self.url).json(&hosts).send().await?;
        if !response.status().is_success() {
            return Err(PredictorError::Status(response.status().as_u16()));
        }
        let weights = response.json::<HashMap<String, f64>>().await?;
        Ok(weights)
    }
}
