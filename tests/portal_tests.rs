//! Intake portal routes, exercised through the router without a listener.

mod test_harness;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use contest_scorer::node::ScorerNode;
use contest_scorer::portal::{router, PortalState};
use test_harness::*;

fn app(node: &ScorerNode) -> Router {
    router(PortalState {
        pool: node.pool.clone(),
    })
}

fn submission(userkey: &str, endpoint: &str) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("userkey", userkey)
        .append_pair("endpoint", endpoint)
        .append_pair("project_id", "p1")
        .finish();
    Request::builder()
        .method("POST")
        .uri("/benchmark")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn node_for(shop: &FakeStorefront) -> ScorerNode {
    test_node(
        test_config(Duration::from_millis(200)),
        shop,
        inventory("p1", regional_project()),
        memory_store(),
    )
}

#[tokio::test]
async fn health_and_index() {
    let shop = FakeStorefront::healthy().await;
    let node = node_for(&shop).await;
    let app = app(&node);

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains(r#"action="/benchmark""#));
}

#[tokio::test]
async fn submission_is_accepted_once() {
    let shop = FakeStorefront::healthy().await;
    let node = node_for(&shop).await;
    let app = app(&node);

    let (status, body) = send(&app, submission("key-alice", shop.url.as_str())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);
    assert!(body["job_id"].is_string());

    let (status, body) = send(&app, submission("key-alice", shop.url.as_str())).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "already in the queue: key-alice");

    let (status, jobs) = send(&app, get("/api/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["display_name"], "alice");
    assert!(jobs[0].get("participant_key").is_none());

    node.pool.wait_idle().await;
    let (_, jobs) = send(&app, get("/api/jobs")).await;
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let shop = FakeStorefront::healthy().await;
    let node = node_for(&shop).await;
    let app = app(&node);

    let (status, body) = send(&app, submission("key-mallory", shop.url.as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid userkey: key-mallory");

    let (status, body) = send(&app, submission("key-bob", "ftp://files.example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, submission("key-bob", "not a url")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(node.pool.queue().in_flight_count(), 0);
}

#[tokio::test]
async fn ranking_lists_finished_jobs() {
    let shop = FakeStorefront::healthy().await;
    let node = node_for(&shop).await;
    let app = app(&node);

    let (_, ranking) = send(&app, get("/api/ranking")).await;
    assert!(ranking.as_array().unwrap().is_empty());

    for key in ["key-alice", "key-bob"] {
        let (status, _) = send(&app, submission(key, shop.url.as_str())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    node.pool.wait_idle().await;

    let (status, ranking) = send(&app, get("/api/ranking")).await;
    assert_eq!(status, StatusCode::OK);
    let ranking = ranking.as_array().unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0]["rank"], 1);
    assert_eq!(ranking[1]["rank"], 2);
    assert!(ranking[0]["score"].as_u64().unwrap() >= ranking[1]["score"].as_u64().unwrap());
    assert!(ranking[0]["score"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn submissions_after_shutdown_are_unavailable() {
    let shop = FakeStorefront::healthy().await;
    let node = node_for(&shop).await;
    let app = app(&node);

    node.pool.shutdown().await;
    let (status, body) = send(&app, submission("key-carol", shop.url.as_str())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "job queue is closed");
}
