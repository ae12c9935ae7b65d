//! A mock HTTP predictor (spec §6 "Prediction interface"), built on `axum`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;

#[derive(Default)]
struct SharedState {
    weights: HashMap<String, f64>,
    fail: bool,
}

/// A running mock predictor HTTP server. Its served weight map can be
/// mutated after construction to simulate a predictor refresh.
pub struct MockPredictorServer {
    addr: SocketAddr,
    state: Arc<Mutex<SharedState>>,
    _task: tokio::task::JoinHandle<()>,
}

impl MockPredictorServer {
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(SharedState::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let app_state = state.clone();
        let app = Router::new().route("/predict", post(predict)).with_state(app_state);
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, state, _task: task })
    }

    pub fn url(&self) -> String {
        format!("http://{}/predict", self.addr)
    }

    pub fn set_weights(&self, weights: HashMap<String, f64>) {
        self.state.lock().unwrap().weights = weights;
    }

    /// Make every subsequent request fail with a 500, exercising the
    /// uniform-weight fallback path.
    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }
}

async fn predict(
    State(state): State<Arc<Mutex<SharedState>>>,
    Json(hosts): Json<Vec<String>>,
) -> Result<Json<HashMap<String, f64>>, axum::http::StatusCode> {
    let guard = state.lock().unwrap();
    if guard.fail {
        return Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
    let response = hosts
        .into_iter()
        .map(|h| {
            let weight = *guard.weights.get(&h).unwrap_or(&1.0);
            (h, weight)
        })
        .collect();
    Ok(Json(response))
}
