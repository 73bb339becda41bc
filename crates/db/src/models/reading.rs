use herdwatch_core::reading::Reading;
use herdwatch_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `readings` table.
#[derive(Debug, Clone, FromRow)]
pub struct ReadingRow {
    pub id: DbId,
    pub subject_tag_id: String,
    pub recorded_at: Timestamp,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<f64>,
    pub motion_intensity: Option<f64>,
    pub battery_level: Option<f64>,
    /// Epoch seconds after which the retention job may delete the row.
    pub expires_at: i64,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            subject_tag_id: row.subject_tag_id,
            timestamp: row.recorded_at,
            temperature: row.temperature,
            pulse_rate: row.pulse_rate,
            motion_intensity: row.motion_intensity,
            battery_level: row.battery_level,
        }
    }
}
