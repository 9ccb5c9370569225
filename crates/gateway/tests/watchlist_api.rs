//! Integration tests against the axum router: add-then-list, add-duplicate,
//! add-malformed, and remove scenarios.

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
async fn add_then_list() {
    let app = test_app(test_state());

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/watchlist")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"cid":"1234567"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/api/watchlist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["cid"], "1234567");
}

#[tokio::test]
async fn add_duplicate_rejects_409() {
    let app = test_app(test_state());
    let req = || {
        Request::post("/api/watchlist")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"cid":"1234567"}"#))
            .unwrap()
    };

    let first = app.clone().oneshot(req()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(req()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["error"], "Already on watchlist");
}

#[tokio::test]
async fn add_malformed_cid_rejects_400() {
    let app = test_app(test_state());
    let response = app
        .oneshot(
            Request::post("/api/watchlist")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"cid":"abc"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid CID format");
}

#[tokio::test]
async fn remove_then_remove_again_is_404() {
    let app = test_app(test_state());

    let add = Request::post("/api/watchlist")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"cid":"1234567"}"#))
        .unwrap();
    app.clone().oneshot(add).await.unwrap();

    let first = app
        .clone()
        .oneshot(Request::delete("/api/watchlist/1234567").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(Request::delete("/api/watchlist/1234567").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_unknown_controller_rejects_404() {
    let state = test_state();
    let feed = FakeDataFeed::default();
    feed.members.lock().await.insert("7654321".to_string(), false);
    let state = AppState {
        feed: Arc::new(feed),
        ..state
    };
    let app = test_app(state);

    let response = app
        .oneshot(
            Request::post("/api/watchlist")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"cid":"7654321"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
