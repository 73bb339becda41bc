//! Alert types shared by the classifier, the cooldown gate and the writer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Kind of anomaly an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "pulseRate")]
    PulseRate,
    #[serde(rename = "motion")]
    Motion,
    #[serde(rename = "battery")]
    Battery,
}

impl AlertType {
    pub const ALL: [AlertType; 4] = [
        AlertType::Temperature,
        AlertType::PulseRate,
        AlertType::Motion,
        AlertType::Battery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Temperature => "temperature",
            AlertType::PulseRate => "pulseRate",
            AlertType::Motion => "motion",
            AlertType::Battery => "battery",
        }
    }

    /// Minimum spacing between two alerts of this type for the same subject.
    pub fn cooldown(self) -> Duration {
        match self {
            AlertType::Temperature | AlertType::PulseRate => Duration::from_secs(15 * 60),
            AlertType::Motion => Duration::from_secs(10 * 60),
            AlertType::Battery => Duration::from_secs(60 * 60),
        }
    }

    /// Cooldown as a signed chrono duration, for timestamp arithmetic.
    pub fn cooldown_chrono(self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown().as_secs() as i64)
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown alert type: {s}"))
    }
}

/// Alert severity, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Acknowledged => "acknowledged",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(AlertStatus::New),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// Copy of the rule bounds in force when the alert fired.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A single rule violation found by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breach {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Aggregated value that violated the rule (window average, or last
    /// known battery level).
    pub value: f64,
    pub threshold: ThresholdSnapshot,
    pub severity: Severity,
}

/// A breach bound to its subject, ready for the cooldown gate and writer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub subject_id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    pub breach: Breach,
    pub timestamp: Timestamp,
}

impl AlertCandidate {
    /// Idempotency key: one alert per subject, type and cooldown bucket.
    pub fn dedup_key(&self) -> String {
        dedup_key(self.subject_id, self.breach.alert_type, self.timestamp)
    }
}

/// Build the `(subject, type, cooldown bucket)` key used for conditional
/// alert inserts.
pub fn dedup_key(subject_id: DbId, alert_type: AlertType, at: Timestamp) -> String {
    let bucket_secs = alert_type.cooldown().as_secs() as i64;
    let bucket = at.timestamp().div_euclid(bucket_secs);
    format!("{subject_id}:{alert_type}:{bucket}")
}

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub alert_id: DbId,
    pub subject_id: DbId,
    pub owner_id: DbId,
    pub tag_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub value: f64,
    pub threshold_snapshot: ThresholdSnapshot,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<DbId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub acknowledged_at: Option<Timestamp>,
}
