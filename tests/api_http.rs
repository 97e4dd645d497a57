// tests/api_http.rs
//
// HTTP-level tests for the API router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use rival_watch::api::{self, AppState};
use rival_watch::{AlertClassifier, AlertRules};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let rules = AlertRules::default().compile().expect("default rules compile");
    api::router(AppState::new(AlertClassifier::new(Arc::new(rules))), None)
}

async fn read_body(resp: axum::response::Response) -> Vec<u8> {
    body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec()
}

fn post_classify(payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/classify")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /classify")
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = test_router().oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(String::from_utf8(read_body(resp).await).unwrap(), "OK");
}

#[tokio::test]
async fn classify_reports_level_keywords_and_cleaned_text() {
    let req = post_classify(json!({ "text": "WinZO raises <b>Series B</b> funding 🚀" }));
    let resp = test_router().oneshot(req).await.expect("oneshot /classify");
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("json");
    assert_eq!(v["level"], "high");
    assert_eq!(v["keywords"], json!(["series", "funding"]));
    assert_eq!(v["normalized"], "WinZO raises Series B funding");
}

#[tokio::test]
async fn classify_empty_text_is_low() {
    let resp = test_router()
        .oneshot(post_classify(json!({ "text": "   " })))
        .await
        .expect("oneshot /classify");
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("json");
    assert_eq!(v["level"], "low");
    assert_eq!(v["keywords"], json!([]));
}

#[tokio::test]
async fn classify_rejects_oversized_text() {
    let big = "a".repeat(70 * 1024);
    let resp = test_router()
        .oneshot(post_classify(json!({ "text": big })))
        .await
        .expect("oneshot /classify");
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn rules_lists_levels_high_first() {
    let req = Request::builder()
        .uri("/rules")
        .body(Body::empty())
        .expect("build GET /rules");
    let resp = test_router().oneshot(req).await.expect("oneshot /rules");
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_slice(&read_body(resp).await).expect("json");
    let levels: Vec<_> = v
        .as_array()
        .expect("array")
        .iter()
        .map(|l| l["level"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(levels, vec!["high", "medium", "low"]);
    assert_eq!(v[0]["channels"], json!(["chat", "email"]));
    assert_eq!(v[2]["cadence"], "weekly");
}

#[tokio::test]
async fn metrics_without_recorder_is_unavailable() {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = test_router().oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
