//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle of the cache and queue routers
//! against the in-memory store.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use store_services::api::{cache_router, queue_router};
use store_services::store::MemoryStore;
use store_services::{CacheService, Pool, PoolOptions, QueueService};
use tower::ServiceExt;

// == Helper Functions ==

fn create_cache_app(store: &MemoryStore) -> Router {
    let pool = Pool::new(store.clone(), PoolOptions::default());
    cache_router(CacheService::new(pool, 300))
}

fn create_queue_app(store: &MemoryStore) -> Router {
    let pool = Pool::new(store.clone(), PoolOptions::default());
    queue_router(QueueService::new(pool, "jobs"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_to_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get_multiple_keys() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app
        .clone()
        .oneshot(post("/set", r#"{"a":"1","b":"2"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response).await, "a set to 1\nb set to 2\n");

    let response = app.oneshot(get("/get?key=a&key=b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_to_text(response).await;
    assert!(text.contains("a = 1"));
    assert!(text.contains("b = 2"));
}

#[tokio::test]
async fn test_get_missing_key() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(get("/get?key=nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response).await, "nope not found\n");
}

#[tokio::test]
async fn test_get_without_keys_is_bad_request() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(get("/get")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_overwrites_existing_value() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    app.clone()
        .oneshot(post("/set", r#"{"k":"old"}"#))
        .await
        .unwrap();
    app.clone()
        .oneshot(post("/set", r#"{"k":"new"}"#))
        .await
        .unwrap();

    let response = app.oneshot(get("/get?key=k")).await.unwrap();
    assert_eq!(body_to_text(response).await, "k = new\n");
}

#[tokio::test]
async fn test_set_with_empty_body() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(post("/set", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_with_invalid_json() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(post("/set", "{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_with_non_string_value() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(post("/set", r#"{"a":1}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_partial_failure_keeps_applied_keys() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);
    store.fail_commands_after(1);

    let response = app
        .clone()
        .oneshot(post("/set", r#"{"a":"1","b":"2"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = body_to_text(response).await;
    assert!(text.starts_with("a set to 1\n"));
    assert!(text.contains("failed to set b"));

    store.clear_failures();
    let response = app.oneshot(get("/get?key=a&key=b")).await.unwrap();
    assert_eq!(body_to_text(response).await, "a = 1\nb not found\n");
}

// == Queue Endpoint Tests ==

#[tokio::test]
async fn test_push_then_pop_in_order() {
    let store = MemoryStore::new();
    let app = create_queue_app(&store);

    let response = app
        .clone()
        .oneshot(post("/push", r#"["x","y"]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_text(response).await, "x pushed\ny pushed\n");
    assert_eq!(store.list_len("jobs"), 2);

    let first = app.clone().oneshot(get("/pop")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_to_text(first).await, "x\n");

    let second = app.clone().oneshot(get("/pop")).await.unwrap();
    assert_eq!(body_to_text(second).await, "y\n");

    let empty = app.oneshot(get("/pop")).await.unwrap();
    assert_eq!(empty.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_push_with_object_body() {
    let store = MemoryStore::new();
    let app = create_queue_app(&store);

    let response = app.oneshot(post("/push", r#"{"a":"b"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.list_len("jobs"), 0);
}

#[tokio::test]
async fn test_push_with_empty_body() {
    let store = MemoryStore::new();
    let app = create_queue_app(&store);

    let response = app.oneshot(post("/push", "   ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_push_partial_failure() {
    let store = MemoryStore::new();
    let app = create_queue_app(&store);
    store.fail_commands_after(2);

    let response = app
        .oneshot(post("/push", r#"["a","b","c"]"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = body_to_text(response).await;
    assert!(text.starts_with("a pushed\nb pushed\n"));
    assert!(text.contains("failed to push c"));
    assert_eq!(store.list_len("jobs"), 2);
}

#[tokio::test]
async fn test_pop_store_failure_is_bad_request() {
    let store = MemoryStore::new();
    let app = create_queue_app(&store);
    store.fail_commands_after(0);

    let response = app.oneshot(get("/pop")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_to_text(response)
        .await
        .starts_with("error issuing pop command"));
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_reports_pool_status() {
    let store = MemoryStore::new();
    let app = create_cache_app(&store);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_to_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
    assert_eq!(json["pool"]["size"], 10);
    assert_eq!(json["pool"]["in_use"], 0);
}

#[tokio::test]
async fn test_health_reports_draining_pool() {
    let store = MemoryStore::new();
    let pool = Pool::new(store.clone(), PoolOptions::default());
    let app = queue_router(QueueService::new(pool.clone(), "jobs"));
    pool.drain();

    let response = app.oneshot(get("/health")).await.unwrap();

    let json: Value = serde_json::from_str(&body_to_text(response).await).unwrap();
    assert_eq!(json["status"], "draining");
}

#[tokio::test]
async fn test_requests_after_drain_are_unavailable() {
    let store = MemoryStore::new();
    let pool = Pool::new(store.clone(), PoolOptions::default());
    let app = cache_router(CacheService::new(pool.clone(), 60));
    pool.drain();

    let response = app.oneshot(post("/set", r#"{"a":"1"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
