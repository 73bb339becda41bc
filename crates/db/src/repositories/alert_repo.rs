//! Repository for the `alerts` table.

use herdwatch_core::alert::AlertType;
use herdwatch_core::store::NewAlert;
use herdwatch_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::alert::AlertRow;

/// Column list for `alerts` queries.
const COLUMNS: &str = "\
    id, subject_id, owner_id, tag_id, triggered_at, \
    alert_type, severity, value, threshold_snapshot, status, \
    acknowledged_by, acknowledged_at, dedup_key";

pub struct AlertRepo;

impl AlertRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent alert of `alert_type` for the subject triggered strictly
    /// after `since`.
    pub async fn latest_since(
        pool: &PgPool,
        subject_id: DbId,
        alert_type: AlertType,
        since: Timestamp,
    ) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE subject_id = $1 AND alert_type = $2 AND triggered_at > $3 \
             ORDER BY triggered_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(subject_id)
            .bind(alert_type.as_str())
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// Insert unless the subject already has an alert of the same type after
    /// `cooldown_since`, or the dedup key is taken. Returns `None` when the
    /// insert was skipped.
    ///
    /// The unique `dedup_key` constraint is what makes concurrent callers for
    /// the same bucket collapse into one row; the `NOT EXISTS` clause covers
    /// alerts from the previous bucket that are still inside the cooldown.
    pub async fn insert_if_clear(
        pool: &PgPool,
        alert: &NewAlert,
        cooldown_since: Timestamp,
    ) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts \
                (subject_id, owner_id, tag_id, triggered_at, alert_type, \
                 severity, value, threshold_snapshot, dedup_key) \
             SELECT $1::BIGINT, $2::BIGINT, $3::TEXT, $4::TIMESTAMPTZ, $5::TEXT, \
                    $6::TEXT, $7::DOUBLE PRECISION, $8::JSONB, $9::TEXT \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM alerts \
                 WHERE subject_id = $1 AND alert_type = $5 AND triggered_at > $10 \
             ) \
             ON CONFLICT ON CONSTRAINT uq_alerts_dedup_key DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(alert.subject_id)
            .bind(alert.owner_id)
            .bind(&alert.tag_id)
            .bind(alert.timestamp)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.value)
            .bind(Json(alert.threshold))
            .bind(&alert.dedup_key)
            .bind(cooldown_since)
            .fetch_optional(pool)
            .await
    }

    /// Unacknowledged alerts for a subject triggered at or after `since`,
    /// newest first.
    pub async fn list_unacknowledged_since(
        pool: &PgPool,
        subject_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE subject_id = $1 AND status = 'new' AND triggered_at >= $2 \
             ORDER BY triggered_at DESC"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(subject_id)
            .bind(since)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_subject(
        pool: &PgPool,
        subject_id: DbId,
        limit: i64,
    ) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE subject_id = $1 \
             ORDER BY triggered_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(subject_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        limit: i64,
    ) -> Result<Vec<AlertRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE owner_id = $1 \
             ORDER BY triggered_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a `new` alert to `acknowledged`. Returns `None` when no alert
    /// with that id is in state `new`.
    pub async fn acknowledge(
        pool: &PgPool,
        id: DbId,
        acknowledged_by: DbId,
        at: Timestamp,
    ) -> Result<Option<AlertRow>, sqlx::Error> {
        let query = format!(
            "UPDATE alerts SET \
                status = 'acknowledged', \
                acknowledged_by = $2, \
                acknowledged_at = $3 \
             WHERE id = $1 AND status = 'new' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AlertRow>(&query)
            .bind(id)
            .bind(acknowledged_by)
            .bind(at)
            .fetch_optional(pool)
            .await
    }
}
