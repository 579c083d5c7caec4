//! REST executor integration tests
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::{Duration, Instant};

use cord_core::events::RateLimit;
use cord_gateway::Client;
use cord_http::RestError;
use integration_tests::{MockResponse, MockServer};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ============================================================================
// Status handling
// ============================================================================

#[tokio::test]
async fn test_gateway_url_resolved() {
    let server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();

    let url = client.rest().gateway().await.unwrap();
    assert_eq!(url, format!("ws://{}/gateway", server.addr));
}

#[tokio::test]
async fn test_rate_limited_request_retries_after_wait() {
    let server = MockServer::start().await.unwrap();
    server.script(
        "limited",
        [
            MockResponse::rate_limited(0.25, false),
            MockResponse::ok(json!({ "id": "1" })),
        ],
    );

    let client = Client::new(server.client_config("Bot token")).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.add_handler(move |limit: RateLimit| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(limit);
        }
    });

    let url = server.scripted_url("limited");
    let started = Instant::now();
    let body = client.rest().request(Method::GET, &url, None).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(server.hits("limited"), 2);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["id"], "1");

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.url, url);
    assert_eq!(event.too_many_requests.retry_after, Duration::from_millis(250));
}

#[tokio::test]
async fn test_rate_limit_surfaced_when_retry_disabled() {
    let server = MockServer::start().await.unwrap();
    server.script("limited", [MockResponse::rate_limited(0.5, false)]);

    let mut config = server.client_config("Bot token");
    config.rest.retry_on_rate_limit = false;
    let client = Client::new(config).unwrap();

    let err = client
        .rest()
        .request(Method::POST, &server.scripted_url("limited"), Some(b"{}".to_vec()))
        .await
        .unwrap_err();

    assert!(matches!(err, RestError::RateLimited { .. }));
    assert_eq!(err.retry_after(), Some(Duration::from_millis(500)));
    assert_eq!(server.hits("limited"), 1);
}

#[tokio::test]
async fn test_bad_gateway_retries_then_fails() {
    let server = MockServer::start().await.unwrap();
    server.script("flaky", [MockResponse::status(502)]);

    let mut config = server.client_config("Bot token");
    config.rest.max_rest_retries = 2;
    let client = Client::new(config).unwrap();

    let err = client
        .rest()
        .request(Method::GET, &server.scripted_url("flaky"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, RestError::MaxRetries { .. }));
    assert_eq!(err.status(), Some(reqwest::StatusCode::BAD_GATEWAY));
    assert_eq!(server.hits("flaky"), 3);
}

#[tokio::test]
async fn test_bad_gateway_then_success() {
    let server = MockServer::start().await.unwrap();
    server.script(
        "flaky",
        [MockResponse::status(502), MockResponse::ok(json!({ "ok": true }))],
    );

    let client = Client::new(server.client_config("Bot token")).unwrap();
    let body: Value = client
        .rest()
        .request_json::<(), _>(Method::GET, &server.scripted_url("flaky"), None)
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(server.hits("flaky"), 2);
}

#[tokio::test]
async fn test_unauthorized_hints_missing_bot_prefix() {
    let server = MockServer::start().await.unwrap();
    let unauthorized = MockResponse {
        body: json!({ "code": 0, "message": "401: Unauthorized" }).to_string(),
        ..MockResponse::status(401)
    };
    server.script("me", [unauthorized]);

    let client = Client::new(server.client_config("plain-token")).unwrap();
    let err = client
        .rest()
        .request(Method::GET, &server.scripted_url("me"), None)
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    let RestError::Status(status) = err else {
        panic!("expected a status error");
    };
    assert!(status.token_prefix_hint);
    assert_eq!(
        status.api_message.map(|m| m.message).as_deref(),
        Some("401: Unauthorized")
    );

    let client = Client::new(server.client_config("Bot token")).unwrap();
    let err = client
        .rest()
        .request(Method::GET, &server.scripted_url("me"), None)
        .await
        .unwrap_err();
    let RestError::Status(status) = err else {
        panic!("expected a status error");
    };
    assert!(!status.token_prefix_hint);
}

#[tokio::test]
async fn test_other_status_is_not_retried() {
    let server = MockServer::start().await.unwrap();
    server.script("missing", [MockResponse::status(404)]);

    let client = Client::new(server.client_config("Bot token")).unwrap();
    let err = client
        .rest()
        .request(Method::DELETE, &server.scripted_url("missing"), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    assert_eq!(server.hits("missing"), 1);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() {
    let server = MockServer::start().await.unwrap();
    server.script(
        "bucket",
        [MockResponse::ok(json!({}))
            .with_header("x-ratelimit-limit", "5")
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset-after", "0.25")],
    );

    let client = Client::new(server.client_config("Bot token")).unwrap();
    let url = server.scripted_url("bucket");

    client.rest().request(Method::GET, &url, None).await.unwrap();
    let started = Instant::now();
    client.rest().request(Method::GET, &url, None).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(server.hits("bucket"), 2);
}

#[tokio::test]
async fn test_global_rate_limit_blocks_every_route() {
    let server = MockServer::start().await.unwrap();
    server.script("global", [MockResponse::rate_limited(0.25, true)]);

    let mut config = server.client_config("Bot token");
    config.rest.retry_on_rate_limit = false;
    let client = Client::new(config).unwrap();

    let err = client
        .rest()
        .request(Method::GET, &server.scripted_url("global"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::RateLimited { ref too_many_requests, .. } if too_many_requests.global));
    assert!(client.rest().limiter().is_globally_limited());

    let started = Instant::now();
    client
        .rest()
        .request(Method::GET, &server.scripted_url("other"), None)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(!client.rest().limiter().is_globally_limited());
}
