//! HTTP surface tests driven through the router with `oneshot`

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rugshield::api::{create_router, AppState};
use rugshield::core::{InMemoryRepository, ScanService};
use rugshield::models::{ServerConfig, ServiceConfig};
use rugshield::providers::AnalyzerRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN: &str = "test-admin-token";
const EVM_TOKEN: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

fn build_app(config: ServiceConfig, admin_token: Option<&str>, rate_limit: u32) -> Router {
    let repo = Arc::new(InMemoryRepository::new());
    let analyzers = AnalyzerRegistry::from_config(&config.providers).unwrap();
    let service = Arc::new(ScanService::new(repo.clone(), Some(repo), analyzers, config));

    let server = ServerConfig {
        admin_token: admin_token.map(str::to_string),
        rate_limit_per_minute: rate_limit,
        ..ServerConfig::default()
    };
    create_router(Arc::new(AppState::new(service, &server)))
}

fn app() -> Router {
    build_app(ServiceConfig::offline(), Some(ADMIN), 0)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

fn analyze_request(api_key: Option<&str>) -> Request<Body> {
    let body = json!({ "chain": "evm", "targetValue": EVM_TOKEN });
    let mut builder = post_json("/api/v1/analyze");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn create_key(app: &Router, tier: &str) -> String {
    let body = json!({ "name": "integration", "tier": tier });
    let request = post_json("/api/v1/admin/keys")
        .header("x-admin-token", ADMIN)
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_request_id() {
    let app = app();

    let (status, headers, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    let generated = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(body["request_id"], generated);

    let request = Request::builder()
        .uri("/api/v1/meta")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-request-id").unwrap(), "req-42");
    assert_eq!(body["data"]["name"], "RugShield");
    assert_eq!(body["data"]["chain_priority"], json!(["sui", "evm", "solana"]));
    assert_eq!(body["data"]["default_chain"], "sui");
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = app();

    let (status, _, body) = send(&app, get("/api/v1/admin/keys")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_FORBIDDEN");

    let wrong = Request::builder()
        .uri("/api/v1/admin/reports/invoice")
        .header("x-admin-token", "nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, wrong).await.0, StatusCode::FORBIDDEN);

    // no token configured: even a presented token is refused
    let locked = build_app(ServiceConfig::offline(), None, 0);
    let request = Request::builder()
        .uri("/api/v1/admin/keys")
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&locked, request).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let app = app();
    let (status, _, body) = send(&app, analyze_request(Some("rgs_free_deadbeef"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_INVALID_KEY");
    assert_eq!(body["error"]["message"], "Invalid or inactive API key.");

    let (status, _, _) = send(&app, get("/api/v1/keys/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_quota_breach_returns_429() {
    let mut config = ServiceConfig::offline();
    config.quotas.free = 1;
    let app = build_app(config, Some(ADMIN), 0);
    let token = create_key(&app, "free").await;

    let (status, _, _) = send(&app, analyze_request(Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(&app, analyze_request(Some(&token))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"], "tier: free, used: 1, quota: 1");

    let status_request = Request::builder()
        .uri("/api/v1/keys/me")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, status_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["used_today"], 1);
    assert_eq!(body["data"]["remaining_today"], 0);
}

#[tokio::test]
async fn test_scan_round_trip() {
    let app = app();

    let (status, _, body) = send(&app, analyze_request(None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["chain"], "evm");
    assert_eq!(body["data"]["risk_level"], "safe");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, fetched) = send(&app, get(&format!("/api/v1/scans/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["id"], id.as_str());
    assert_eq!(fetched["data"]["score"], 100);

    let (status, _, listed) = send(&app, get("/api/v1/scans?chain=evm&limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"]["scans"][0]["id"], id.as_str());

    let (status, _, body) = send(&app, get("/api/v1/scans/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "STORE_NOT_FOUND");

    let (status, _, _) = send(&app, get("/api/v1/scans?limit=zero")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_analyze_input() {
    let app = app();

    let body = json!({ "chain": "evm", "targetValue": "0x1234" });
    let request = post_json("/api/v1/analyze")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CHAIN_INVALID_TARGET");

    let request = post_json("/api/v1/analyze")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INPUT_INVALID");
}

#[tokio::test]
async fn test_key_admin_lifecycle() {
    let app = app();
    let token = create_key(&app, "api").await;

    let request = Request::builder()
        .uri("/api/v1/admin/keys")
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["keys"][0]["id"].as_str().unwrap().to_string();
    // only the prefix is ever returned
    assert!(body["data"]["keys"][0].get("token").is_none());

    let rotate = post_json("/api/v1/keys/rotate")
        .header("x-api-key", token.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, _, rotated) = send(&app, rotate).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rotated["data"]["name"], "integration-rotated");

    // the original was revoked by rotation
    let revoke = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/admin/keys/{}", id))
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, revoke).await.0, StatusCode::NOT_FOUND);

    let new_id = rotated["data"]["id"].as_str().unwrap();
    let revoke = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/admin/keys/{}", new_id))
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, revoke).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_invoice_report_over_http() {
    let app = app();
    let token = create_key(&app, "api").await;
    for _ in 0..3 {
        let (status, _, _) = send(&app, analyze_request(Some(&token))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let request = Request::builder()
        .uri("/api/v1/admin/reports/invoice")
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["invoice"]["currency"], "USD");
    assert_eq!(body["data"]["invoice"]["total_amount_usd"], 0.15);
    assert_eq!(body["data"]["invoice"]["line_items"][0]["billable_units"], 3);

    let request = Request::builder()
        .uri("/api/v1/admin/reports/usage?tier=platinum")
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/api/v1/admin/reports/usage?start=2026-02-01&end=2026-01-01")
        .header("x-admin-token", ADMIN)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_routes_only() {
    let app = build_app(ServiceConfig::offline(), Some(ADMIN), 2);

    for _ in 0..2 {
        assert_eq!(send(&app, get("/api/v1/meta")).await.0, StatusCode::OK);
    }
    let (status, headers, body) = send(&app, get("/api/v1/meta")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "QUOTA_RATE_LIMITED");
    assert!(headers.contains_key("retry-after"));

    assert_eq!(send(&app, get("/health")).await.0, StatusCode::OK);
}
