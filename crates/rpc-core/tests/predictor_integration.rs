//! Exercises `HttpPredictor` against a real HTTP server (spec §6 "Prediction
//! interface"): the success path, and the uniform-weight fallback a caller
//! applies when the predictor itself errors.

use std::collections::HashMap;

use rpc_core::predictor::Predictor;
use rpc_core::HttpPredictor;
use rpc_test_support::MockPredictorServer;

#[tokio::test]
async fn predicts_weights_from_the_mock_service() {
    let server = MockPredictorServer::start().await.unwrap();
    let mut weights = HashMap::new();
    weights.insert("10.0.0.1:9000".to_owned(), 0.8);
    weights.insert("10.0.0.2:9000".to_owned(), 0.2);
    server.set_weights(weights.clone());

    let predictor = HttpPredictor::new(server.url());
    let hosts = vec!["10.0.0.1:9000".to_owned(), "10.0.0.2:9000".to_owned()];
    let result = predictor.predict(&hosts).await.unwrap();

    assert_eq!(result.get("10.0.0.1:9000"), Some(&0.8));
    assert_eq!(result.get("10.0.0.2:9000"), Some(&0.2));
}

#[tokio::test]
async fn missing_host_in_response_is_left_for_the_caller_to_default() {
    let server = MockPredictorServer::start().await.unwrap();
    let mut weights = HashMap::new();
    weights.insert("10.0.0.1:9000".to_owned(), 0.5);
    server.set_weights(weights);

    let predictor = HttpPredictor::new(server.url());
    let hosts = vec!["10.0.0.1:9000".to_owned(), "10.0.0.3:9000".to_owned()];
    let result = predictor.predict(&hosts).await.unwrap();

    assert_eq!(result.get("10.0.0.1:9000"), Some(&0.5));
    assert_eq!(result.get("10.0.0.3:9000"), None);
}

#[tokio::test]
async fn a_failing_predictor_returns_an_error_for_the_caller_to_fall_back_on() {
    let server = MockPredictorServer::start().await.unwrap();
    server.set_failing(true);

    let predictor = HttpPredictor::new(server.url());
    let hosts = vec!["10.0.0.1:9000".to_owned()];
    let err = predictor.predict(&hosts).await.unwrap_err();

    assert!(matches!(err, rpc_core::predictor::PredictorError::Status(500)));
}
