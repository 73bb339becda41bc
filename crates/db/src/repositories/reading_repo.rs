//! Repository for the `readings` table.

use herdwatch_core::reading::Reading;
use herdwatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::reading::ReadingRow;

/// Column list for `readings` queries.
const COLUMNS: &str = "\
    id, subject_tag_id, recorded_at, \
    temperature, pulse_rate, motion_intensity, battery_level, \
    expires_at";

pub struct ReadingRepo;

impl ReadingRepo {
    /// Insert a reading. Returns `false` when the tag already has a reading
    /// recorded at the same instant (redelivery).
    pub async fn insert(
        pool: &PgPool,
        reading: &Reading,
        expires_at: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO readings \
                (subject_tag_id, recorded_at, temperature, pulse_rate, \
                 motion_intensity, battery_level, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ON CONSTRAINT uq_readings_tag_recorded_at DO NOTHING",
        )
        .bind(&reading.subject_tag_id)
        .bind(reading.timestamp)
        .bind(reading.temperature)
        .bind(reading.pulse_rate)
        .bind(reading.motion_intensity)
        .bind(reading.battery_level)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Most recent reading for a tag.
    pub async fn latest_for_tag(
        pool: &PgPool,
        tag_id: &str,
    ) -> Result<Option<ReadingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM readings \
             WHERE subject_tag_id = $1 \
             ORDER BY recorded_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .bind(tag_id)
            .fetch_optional(pool)
            .await
    }

    /// Readings for a tag inside `[from, to]`, oldest first.
    pub async fn list_between(
        pool: &PgPool,
        tag_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<ReadingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM readings \
             WHERE subject_tag_id = $1 AND recorded_at BETWEEN $2 AND $3 \
             ORDER BY recorded_at ASC"
        );
        sqlx::query_as::<_, ReadingRow>(&query)
            .bind(tag_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Delete readings whose `expires_at` is at or before `now_epoch_secs`.
    /// Returns the number of rows removed.
    pub async fn delete_expired(pool: &PgPool, now_epoch_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM readings WHERE expires_at <= $1")
            .bind(now_epoch_secs)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
