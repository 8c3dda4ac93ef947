//! Operator API tests driven through the router without a socket.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use lbproxy::admin::handlers::ConfigResponse;
use lbproxy::config::ProxyConfig;
use lbproxy::http::ApiError;
use lbproxy::rate_limit::{LimitConfig, RepositoryError, SettingsRepository};
use lbproxy::HttpServer;
use serde_json::json;
use tower::ServiceExt;

fn config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.pool.backends = vec!["http://127.0.0.1:1".into(), "http://127.0.0.1:2".into()];
    config.health_check.enabled = false;
    config
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthcheck() {
    let server = HttpServer::new(config()).unwrap();
    let response = send(&server.router(), Method::GET, "/healthcheck", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_set_get_delete_config() {
    let server = HttpServer::new(config()).unwrap();
    let app = server.router();
    let limiter = server.state().limiter.clone();

    // Spend a token under the default limit so a bucket exists.
    assert!(limiter.allow("10.0.0.9").await);
    assert_eq!(limiter.bucket_limit("10.0.0.9").await, Some(LimitConfig::new(100, 10)));

    let response = send(
        &app,
        Method::POST,
        "/api/ratelimit/config",
        Some(json!({"ip": "10.0.0.9", "max_tokens": 2, "refill_rate": 1})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored: ConfigResponse = json_body(response).await;
    assert_eq!(
        stored,
        ConfigResponse {
            ip: "10.0.0.9".into(),
            max_tokens: 2,
            refill_rate: 1
        }
    );

    // The old bucket is gone; the next request builds one from the override.
    assert_eq!(limiter.bucket_limit("10.0.0.9").await, None);
    assert!(limiter.allow("10.0.0.9").await);
    assert!(limiter.allow("10.0.0.9").await);
    assert!(!limiter.allow("10.0.0.9").await);

    let response = send(&app, Method::GET, "/api/ratelimit/config/10.0.0.9", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: ConfigResponse = json_body(response).await;
    assert_eq!((fetched.max_tokens, fetched.refill_rate), (2, 1));

    let response = send(&app, Method::DELETE, "/api/ratelimit/config/10.0.0.9", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(limiter.bucket_limit("10.0.0.9").await, None);

    let response = send(&app, Method::GET, "/api/ratelimit/config/10.0.0.9", None).await;
    let fetched: ConfigResponse = json_body(response).await;
    assert_eq!((fetched.max_tokens, fetched.refill_rate), (100, 10));
}

#[tokio::test]
async fn test_set_config_trims_ip() {
    let server = HttpServer::new(config()).unwrap();
    let app = server.router();
    let limiter = server.state().limiter.clone();
    assert!(limiter.allow("10.0.0.1").await);

    let response = send(
        &app,
        Method::POST,
        "/api/ratelimit/config",
        Some(json!({"ip": " 10.0.0.1 ", "max_tokens": 5, "refill_rate": 1})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored: ConfigResponse = json_body(response).await;
    assert_eq!(stored.ip, "10.0.0.1");

    // The stale bucket under the plain key was cleared.
    assert_eq!(limiter.bucket_limit("10.0.0.1").await, None);

    let response = send(&app, Method::GET, "/api/ratelimit/config/10.0.0.1", None).await;
    let fetched: ConfigResponse = json_body(response).await;
    assert_eq!((fetched.max_tokens, fetched.refill_rate), (5, 1));

    assert!(limiter.allow("10.0.0.1").await);
    assert_eq!(limiter.bucket_limit("10.0.0.1").await, Some(LimitConfig::new(5, 1)));
}

#[tokio::test]
async fn test_set_config_validation() {
    let server = HttpServer::new(config()).unwrap();
    let app = server.router();

    let cases = [
        (json!({"ip": "", "max_tokens": 1, "refill_rate": 1}), "ip is required"),
        (json!({"ip": "  ", "max_tokens": 1, "refill_rate": 1}), "ip is required"),
        (json!({"ip": "1.1.1.1", "max_tokens": 0, "refill_rate": 1}), "max_tokens must be positive"),
        (json!({"ip": "1.1.1.1", "max_tokens": 5, "refill_rate": -1}), "refill_rate must be positive"),
        (json!({"ip": "1.1.1.1"}), "max_tokens must be positive"),
        (json!({"ip": "1.1.1.1", "max_tokens": "lots", "refill_rate": 1}), "Invalid request body"),
    ];

    for (body, message) in cases {
        let response = send(&app, Method::POST, "/api/ratelimit/config", Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = json_body(response).await;
        assert_eq!(error, ApiError::bad_request(message));
    }
}

#[tokio::test]
async fn test_missing_ip_is_rejected() {
    let server = HttpServer::new(config()).unwrap();
    let app = server.router();

    for method in [Method::GET, Method::DELETE] {
        let response = send(&app, method, "/api/ratelimit/config/", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiError = json_body(response).await;
        assert_eq!(error.message, "IP is required");
    }
}

#[tokio::test]
async fn test_backends_view() {
    let server = HttpServer::new(config()).unwrap();
    server.state().backends.pool().backends()[1].set_alive(false);

    let response = send(&server.router(), Method::GET, "/api/backends", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view: serde_json::Value = json_body(response).await;
    assert_eq!(
        view,
        json!({
            "method": "round-robin",
            "backends": [
                {"address": "http://127.0.0.1:1", "alive": true, "active_connections": 0},
                {"address": "http://127.0.0.1:2", "alive": false, "active_connections": 0},
            ]
        })
    );
}

struct UnreachableStore;

#[async_trait]
impl SettingsRepository for UnreachableStore {
    async fn get_config(&self, _key: &str) -> Result<LimitConfig, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn set_config(&self, _key: &str, _config: LimitConfig) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn delete_config(&self, _key: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_failures() {
    let server = HttpServer::with_settings(config(), Arc::new(UnreachableStore)).unwrap();
    let app = server.router();

    let response = send(
        &app,
        Method::POST,
        "/api/ratelimit/config",
        Some(json!({"ip": "10.0.0.1", "max_tokens": 5, "refill_rate": 1})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ApiError = json_body(response).await;
    assert_eq!(error.message, "Failed to set config");

    let response = send(&app, Method::GET, "/api/ratelimit/config/10.0.0.1", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ApiError = json_body(response).await;
    assert_eq!(error.message, "Failed to get config");

    let response = send(&app, Method::DELETE, "/api/ratelimit/config/10.0.0.1", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ApiError = json_body(response).await;
    assert_eq!(error.message, "Failed to delete config");

    // Request admission falls back to the default limit.
    let limiter = server.state().limiter.clone();
    assert!(limiter.allow("10.0.0.1").await);
    assert_eq!(limiter.bucket_limit("10.0.0.1").await, Some(LimitConfig::new(100, 10)));
}
