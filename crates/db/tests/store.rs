//! Integration tests for the PostgreSQL store.
//!
//! These need a reachable Postgres in `DATABASE_URL` and are ignored by
//! default: `cargo test -p herdwatch-db -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use herdwatch_core::alert::{
    AlertCandidate, AlertStatus, AlertType, Breach, Severity, ThresholdSnapshot,
};
use herdwatch_core::reading::Reading;
use herdwatch_core::store::{AckOutcome, AlertStore, NewAlert, ReadingStore, SubjectDirectory};
use herdwatch_core::types::Timestamp;
use herdwatch_db::models::subject::CreateSubject;
use herdwatch_db::repositories::SubjectRepo;
use herdwatch_db::PgStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
}

async fn seed_subject(pool: &PgPool, tag: &str) -> i64 {
    SubjectRepo::create(
        pool,
        &CreateSubject {
            owner_id: 42,
            tag_id: tag.to_string(),
            name: format!("Cow {tag}"),
        },
    )
    .await
    .unwrap()
    .id
}

fn reading(tag: &str, at: Timestamp, temperature: f64) -> Reading {
    Reading {
        subject_tag_id: tag.to_string(),
        timestamp: at,
        temperature: Some(temperature),
        pulse_rate: Some(62.0),
        motion_intensity: None,
        battery_level: Some(80.0),
    }
}

fn new_alert(subject_id: i64, at: Timestamp) -> NewAlert {
    NewAlert::from(&AlertCandidate {
        subject_id,
        owner_id: 42,
        tag_id: "TAG-A".into(),
        timestamp: at,
        breach: Breach {
            alert_type: AlertType::Temperature,
            value: 40.1,
            threshold: ThresholdSnapshot {
                min: Some(37.5),
                max: Some(39.5),
            },
            severity: Severity::Medium,
        },
    })
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn subject_lookup_by_tag_and_id(pool: PgPool) {
    let id = seed_subject(&pool, "TAG-A").await;
    let store = PgStore::new(pool);

    let by_tag = store.find_by_tag("TAG-A").await.unwrap().unwrap();
    assert_eq!(by_tag.id, id);
    assert_eq!(by_tag.owner_id, 42);

    assert!(store.find_by_id(id).await.unwrap().is_some());
    assert!(store.find_by_tag("TAG-Z").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn redelivered_reading_is_stored_once(pool: PgPool) {
    let store = PgStore::new(pool);
    let r = reading("TAG-A", t0(), 38.4);
    let expires_at = t0().timestamp() + 86_400;

    assert!(store.insert(&r, expires_at).await.unwrap());
    assert!(!store.insert(&r, expires_at).await.unwrap());

    let rows = store
        .between("TAG-A", t0() - Duration::minutes(1), t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(rows, vec![r]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn latest_and_range_queries(pool: PgPool) {
    let store = PgStore::new(pool);
    for minute in 0..5 {
        let r = reading("TAG-A", t0() + Duration::minutes(minute), 38.0 + minute as f64 / 10.0);
        store.insert(&r, t0().timestamp() + 86_400).await.unwrap();
    }

    let latest = store.latest("TAG-A").await.unwrap().unwrap();
    assert_eq!(latest.timestamp, t0() + Duration::minutes(4));

    let range = store
        .between("TAG-A", t0() + Duration::minutes(1), t0() + Duration::minutes(3))
        .await
        .unwrap();
    let minutes: Vec<i64> = range
        .iter()
        .map(|r| (r.timestamp - t0()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![1, 2, 3]);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn purge_removes_only_expired_readings(pool: PgPool) {
    let store = PgStore::new(pool);
    let now = t0().timestamp();
    store.insert(&reading("TAG-A", t0(), 38.0), now - 1).await.unwrap();
    store
        .insert(&reading("TAG-A", t0() + Duration::minutes(1), 38.1), now + 3600)
        .await
        .unwrap();

    assert_eq!(store.purge_expired(now).await.unwrap(), 1);
    assert_eq!(store.latest("TAG-A").await.unwrap().unwrap().temperature, Some(38.1));
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn conditional_insert_respects_cooldown_and_dedup_key(pool: PgPool) {
    let subject_id = seed_subject(&pool, "TAG-A").await;
    let store = PgStore::new(pool);
    let cooldown = AlertType::Temperature.cooldown_chrono();

    let first = store
        .insert_if_clear(&new_alert(subject_id, t0()), t0() - cooldown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, AlertStatus::New);
    assert_eq!(first.threshold_snapshot.max, Some(39.5));

    // Same bucket: dedup key collision.
    let same_bucket = new_alert(subject_id, t0() + Duration::minutes(5));
    assert!(store
        .insert_if_clear(&same_bucket, same_bucket.timestamp - cooldown)
        .await
        .unwrap()
        .is_none());

    // Next bucket but still inside the cooldown of the first alert.
    let mut next_bucket = new_alert(subject_id, t0() + Duration::minutes(14));
    next_bucket.dedup_key = format!("{}:temperature:other", subject_id);
    assert!(store
        .insert_if_clear(&next_bucket, next_bucket.timestamp - cooldown)
        .await
        .unwrap()
        .is_none());

    // After the cooldown.
    let later = new_alert(subject_id, t0() + Duration::minutes(16));
    assert!(store
        .insert_if_clear(&later, later.timestamp - cooldown)
        .await
        .unwrap()
        .is_some());

    let gate_hit = store
        .latest_since(subject_id, AlertType::Temperature, t0())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(gate_hit.timestamp, t0() + Duration::minutes(16));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn acknowledge_transitions_once(pool: PgPool) {
    let subject_id = seed_subject(&pool, "TAG-A").await;
    let store = PgStore::new(pool);
    let alert = store
        .insert_if_clear(&new_alert(subject_id, t0()), t0() - Duration::minutes(15))
        .await
        .unwrap()
        .unwrap();

    let at = t0() + Duration::minutes(3);
    match store.acknowledge(alert.alert_id, 7, at).await.unwrap() {
        AckOutcome::Acknowledged(acked) => {
            assert_eq!(acked.status, AlertStatus::Acknowledged);
            assert_eq!(acked.acknowledged_by, Some(7));
            assert_eq!(acked.acknowledged_at, Some(at));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(
        store.acknowledge(alert.alert_id, 7, at).await.unwrap(),
        AckOutcome::AlreadyAcknowledged
    );
    assert_eq!(
        store.acknowledge(alert.alert_id + 1000, 7, at).await.unwrap(),
        AckOutcome::NotFound
    );

    let open = store
        .unacknowledged_since(subject_id, t0() - Duration::minutes(10))
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn listings_are_newest_first(pool: PgPool) {
    let subject_id = seed_subject(&pool, "TAG-A").await;
    let store = PgStore::new(pool);
    for hours in 0..3 {
        let at = t0() + Duration::hours(hours);
        store
            .insert_if_clear(&new_alert(subject_id, at), at - Duration::minutes(15))
            .await
            .unwrap()
            .unwrap();
    }

    let by_subject = store.list_for_subject(subject_id, 2).await.unwrap();
    assert_eq!(by_subject.len(), 2);
    assert!(by_subject[0].timestamp > by_subject[1].timestamp);

    let by_owner = store.list_for_owner(42, 10).await.unwrap();
    assert_eq!(by_owner.len(), 3);
}
