//! Integration tests for `/api/audit/:scope` and `/api/audit/run`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rosterwatch::state::AppState;
use rosterwatch_domain::config::Config;
use rosterwatch_engine::feed::fake::FakeDataFeed;
use rosterwatch_store::transport::memory::MemoryTransport;
use tower::ServiceExt;

fn test_state() -> AppState {
    AppState {
        config: Arc::new(Config::default()),
        transport: Arc::new(MemoryTransport::empty()),
        feed: Arc::new(FakeDataFeed::default()),
        tick_in_flight: Arc::new(AtomicBool::new(false)),
    }
}

fn test_app(state: AppState) -> Router {
    rosterwatch::api::router().with_state(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn empty_scope_has_no_active_or_completed() {
    let app = test_app(test_state());
    let response = app
        .oneshot(Request::get("/api/audit/visiting").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["active"].as_array().unwrap().len(), 0);
    assert_eq!(body["completed"].as_array().unwrap().len(), 0);
    assert_eq!(body["stats"]["totalActive"], 0);
}

#[tokio::test]
async fn invalid_scope_is_400() {
    let app = test_app(test_state());
    let response = app
        .oneshot(Request::get("/api/audit/bogus").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_run_then_second_run_rejects_409() {
    let app = test_app(test_state());

    let add = Request::post("/api/watchlist")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"cid":"1234567"}"#))
        .unwrap();
    app.clone().oneshot(add).await.unwrap();

    let first = app
        .clone()
        .oneshot(Request::post("/api/audit/run").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(Request::post("/api/audit/run").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}
