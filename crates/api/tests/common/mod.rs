#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use herdwatch_core::clock::ManualClock;
use herdwatch_core::store::memory::{MemoryStore, RecordingDispatcher};
use herdwatch_core::store::Subject;
use herdwatch_core::types::Timestamp;
use http_body_util::BodyExt;
use tower::ServiceExt;

use herdwatch_api::config::ServerConfig;
use herdwatch_api::router::build_app_router;
use herdwatch_api::state::{AppState, Collaborators};

/// Owner of every subject created by [`TestApp::new`].
pub const OWNER_ID: i64 = 10;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

pub fn start() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

/// Subject `id` wearing tag `TAG-{id}`, owned by [`OWNER_ID`].
pub fn subject(id: i64) -> Subject {
    Subject {
        id,
        owner_id: OWNER_ID,
        tag_id: format!("TAG-{id}"),
        name: format!("Cow {id}"),
    }
}

/// Application wired to an in-memory store and a manual clock.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl TestApp {
    /// Subjects 1 and 2 exist.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::with_subjects([subject(1), subject(2)]));
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let state = AppState::new(
            test_config(),
            Collaborators::from_store(Arc::clone(&store), dispatcher.clone(), clock.clone()),
        );
        Self {
            state,
            store,
            clock,
            dispatcher,
        }
    }

    /// Full router with the production middleware stack.
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone(), &test_config())
    }
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Ingestion payload for `tag` at `start() + minute` minutes.
pub fn reading_body(tag: &str, minute: i64, temperature: f64) -> serde_json::Value {
    let ts = start() + chrono::Duration::minutes(minute);
    serde_json::json!({
        "subjectTagId": tag,
        "temperature": temperature,
        "timestamp": ts.timestamp_millis(),
    })
}
