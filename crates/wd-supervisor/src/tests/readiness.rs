use crate::{HttpReadinessCheck, ReadinessCheck, SupervisorError};

use std::time::Duration;

use serde_json::json;
use wd_config::Binding;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn binding_for(server: &MockServer) -> Binding {
    let address = server.address();
    Binding::new(address.ip().to_string(), address.port())
}

fn check(timeout: Duration) -> HttpReadinessCheck {
    HttpReadinessCheck::new("/api/tags", "models", timeout).unwrap()
}

#[tokio::test]
async fn given_models_marker_when_check_then_ok() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "olmocr:7b" }]
        })))
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_secs(5))
        .check(&binding_for(&mock_server))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn given_empty_model_list_when_check_then_ok() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_secs(5))
        .check(&binding_for(&mock_server))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn given_json_without_marker_when_check_then_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_secs(5))
        .check(&binding_for(&mock_server))
        .await;

    assert!(matches!(
        result,
        Err(SupervisorError::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn given_non_json_body_when_check_then_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ollama is running"))
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_secs(5))
        .check(&binding_for(&mock_server))
        .await;

    assert!(matches!(
        result,
        Err(SupervisorError::MalformedResponse { .. })
    ));
}

#[tokio::test]
async fn given_server_error_when_check_then_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_secs(5))
        .check(&binding_for(&mock_server))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SupervisorError::MalformedResponse { .. }));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn given_slow_endpoint_when_check_then_probe_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "models": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let result = check(Duration::from_millis(300))
        .check(&binding_for(&mock_server))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SupervisorError::ProbeTimeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn given_nothing_listening_when_check_then_http_error() {
    let port = {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = check(Duration::from_secs(2))
        .check(&Binding::new("127.0.0.1", port))
        .await;

    assert!(matches!(result, Err(SupervisorError::Http { .. })));
}
