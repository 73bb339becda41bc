//! Integration tests for reading ingestion and history.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, reading_body, TestApp};
use serde_json::json;

/// Ingest `count` temperature readings for subject 1, one per minute.
async fn ingest_series(app: &TestApp, count: i64, temperature: f64) -> serde_json::Value {
    let mut last = serde_json::Value::Null;
    for minute in 0..count {
        let response = post_json(
            app.router(),
            "/api/v1/readings",
            reading_body("TAG-1", minute, temperature),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        last = body_json(response).await;
    }
    last
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_reading_returns_report() {
    let app = TestApp::new();
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 0, 38.6)).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["subjectId"], 1);
    assert_eq!(json["data"]["windowLen"], 1);
    assert_eq!(json["data"]["evaluated"], false);
    assert_eq!(json["data"]["duplicate"], false);
    assert_eq!(app.store.readings("TAG-1").len(), 1);
}

#[tokio::test]
async fn blank_tag_is_a_validation_error() {
    let app = TestApp::new();
    let response = post_json(
        app.router(),
        "/api/v1/readings",
        json!({"subjectTagId": "  ", "temperature": 38.6}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_tag_is_a_validation_error() {
    let app = TestApp::new();
    let response = post_json(app.router(), "/api/v1/readings", json!({"temperature": 38.6})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tag_returns_404() {
    let app = TestApp::new();
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-404", 0, 38.6)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn store_outage_returns_503_and_leaves_window_untouched() {
    let app = TestApp::new();
    app.store.set_unavailable(true);

    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 0, 38.6)).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "STORE_UNAVAILABLE");
    assert_eq!(app.state.pipeline.tracked_subjects().await, 0);
}

#[tokio::test]
async fn redelivered_reading_is_reported_as_duplicate() {
    let app = TestApp::new();
    post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 0, 38.6)).await;
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 0, 38.6)).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["duplicate"], true);
    assert_eq!(json["data"]["windowLen"], 1);
    assert_eq!(app.store.readings("TAG-1").len(), 1);
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_window_of_fever_raises_one_alert() {
    let app = TestApp::new();
    let json = ingest_series(&app, 12, 41.2).await;

    let data = &json["data"];
    assert_eq!(data["windowLen"], 12);
    assert_eq!(data["evaluated"], true);
    assert_eq!(data["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(data["alerts"][0]["type"], "temperature");
    assert_eq!(data["alerts"][0]["severity"], "high");
    assert_eq!(data["alerts"][0]["status"], "new");
    assert_eq!(data["alerts"][0]["thresholdSnapshot"]["max"], 39.5);
    assert_eq!(app.store.alerts().len(), 1);
}

#[tokio::test]
async fn eleven_readings_do_not_evaluate() {
    let app = TestApp::new();
    let json = ingest_series(&app, 11, 41.2).await;
    assert_eq!(json["data"]["evaluated"], false);
    assert!(app.store.alerts().is_empty());
}

#[tokio::test]
async fn breach_inside_cooldown_is_suppressed() {
    let app = TestApp::new();
    ingest_series(&app, 12, 39.8).await;

    app.clock.advance(chrono::Duration::minutes(5));
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 12, 39.8)).await;
    let json = body_json(response).await;

    assert_eq!(json["data"]["evaluated"], true);
    assert!(json["data"]["alerts"].as_array().unwrap().is_empty());
    assert_eq!(json["data"]["suppressed"], json!(["temperature"]));
    assert_eq!(app.store.alerts().len(), 1);
}

#[tokio::test]
async fn breach_after_cooldown_raises_a_new_alert() {
    let app = TestApp::new();
    ingest_series(&app, 12, 39.8).await;

    app.clock.advance(chrono::Duration::minutes(16));
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 12, 39.8)).await;
    let json = body_json(response).await;

    assert_eq!(json["data"]["alerts"][0]["severity"], "low");
    assert_eq!(app.store.alerts().len(), 2);
}

#[tokio::test]
async fn created_alert_is_dispatched() {
    let app = TestApp::new();
    ingest_series(&app, 12, 41.2).await;

    for _ in 0..50 {
        if !app.dispatcher.sent().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(app.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn redelivery_after_alert_store_outage_raises_the_lost_alert() {
    let app = TestApp::new();
    ingest_series(&app, 11, 41.2).await;

    app.store.set_alerts_unavailable(true);
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 11, 41.2)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.store.alerts().is_empty());

    app.store.set_alerts_unavailable(false);
    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 11, 41.2)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["duplicate"], true);
    assert_eq!(json["data"]["evaluated"], true);
    assert_eq!(json["data"]["windowLen"], 12);
    assert_eq!(json["data"]["alerts"][0]["type"], "temperature");
    assert_eq!(app.store.alerts().len(), 1);
}

#[tokio::test]
async fn repeated_redelivery_of_an_evaluated_reading_raises_nothing_new() {
    let app = TestApp::new();
    ingest_series(&app, 12, 41.2).await;

    let response = post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", 11, 41.2)).await;
    let json = body_json(response).await;

    assert_eq!(json["data"]["duplicate"], true);
    assert_eq!(json["data"]["evaluated"], true);
    assert!(json["data"]["alerts"].as_array().unwrap().is_empty());
    assert_eq!(json["data"]["suppressed"], json!(["temperature"]));
    assert_eq!(app.store.alerts().len(), 1);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_returns_readings_inside_the_range() {
    let app = TestApp::new();
    for minute in [-90, -30, -5] {
        post_json(app.router(), "/api/v1/readings", reading_body("TAG-1", minute, 38.6)).await;
    }

    let response = get(app.router(), "/api/v1/subjects/1/readings?minutes=60").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let readings = json["data"].as_array().unwrap();
    assert_eq!(readings.len(), 2);
    assert!(readings[0]["timestamp"].as_i64() < readings[1]["timestamp"].as_i64());
}

#[tokio::test]
async fn history_rejects_out_of_range_minutes() {
    let app = TestApp::new();
    for uri in [
        "/api/v1/subjects/1/readings?minutes=0",
        "/api/v1/subjects/1/readings?minutes=1441",
    ] {
        let response = get(app.router(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn history_for_unknown_subject_returns_404() {
    let app = TestApp::new();
    let response = get(app.router(), "/api/v1/subjects/99/readings").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
