//! End-to-end HTTP tests against PostgreSQL.
//!
//! Ignored by default; run with a reachable `DATABASE_URL`:
//! `cargo test -p herdwatch-api --test pg_app -- --ignored`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get, post_json, reading_body, test_config};
use herdwatch_api::router::build_app_router;
use herdwatch_api::state::{AppState, Collaborators};
use herdwatch_core::clock::ManualClock;
use herdwatch_core::store::memory::RecordingDispatcher;
use herdwatch_db::models::subject::CreateSubject;
use herdwatch_db::repositories::SubjectRepo;
use herdwatch_db::PgStore;
use serde_json::json;
use sqlx::PgPool;

async fn pg_state(pool: PgPool) -> (AppState, i64) {
    let subject = SubjectRepo::create(
        &pool,
        &CreateSubject {
            owner_id: 7,
            tag_id: "TAG-PG".into(),
            name: "Cow PG".into(),
        },
    )
    .await
    .unwrap();

    let state = AppState::new(
        test_config(),
        Collaborators::from_store(
            Arc::new(PgStore::new(pool)),
            Arc::new(RecordingDispatcher::new()),
            Arc::new(ManualClock::new(common::start())),
        ),
    );
    (state, subject.id)
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn health_reports_reachable_database(pool: PgPool) {
    let (state, _) = pg_state(pool).await;
    let app = build_app_router(state, &test_config());

    let json = body_json(get(app, "/health").await).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fever_series_persists_and_acknowledges_one_alert(pool: PgPool) {
    let (state, subject_id) = pg_state(pool).await;
    let config = test_config();

    let mut last = serde_json::Value::Null;
    for minute in 0..13 {
        let app = build_app_router(state.clone(), &config);
        let response = post_json(app, "/api/v1/readings", reading_body("TAG-PG", minute, 41.2)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        last = body_json(response).await;
    }
    assert_eq!(last["data"]["suppressed"], json!(["temperature"]));

    let app = build_app_router(state.clone(), &config);
    let uri = format!("/api/v1/subjects/{subject_id}/alerts");
    let json = body_json(get(app, &uri).await).await;
    let alerts = json["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);

    let alert_id = alerts[0]["alertId"].as_i64().unwrap();
    let uri = format!("/api/v1/alerts/{alert_id}/acknowledge");
    let app = build_app_router(state.clone(), &config);
    let response = post_json(app, &uri, json!({"acknowledgedBy": 7})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = build_app_router(state, &config);
    let response = post_json(app, &uri, json!({"acknowledgedBy": 7})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
