//! Sensor readings reported by livestock-worn tags.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::types::Timestamp;

/// A physiological metric carried by a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Temperature,
    PulseRate,
    MotionIntensity,
    BatteryLevel,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::PulseRate,
        Metric::MotionIntensity,
        Metric::BatteryLevel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::PulseRate => "pulseRate",
            Metric::MotionIntensity => "motionIntensity",
            Metric::BatteryLevel => "batteryLevel",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable sample from a tag.
///
/// Every metric is optional: an absent field means "not reported this cycle",
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub subject_tag_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

impl Reading {
    /// Value of `metric` in this reading, if it was reported.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::PulseRate => self.pulse_rate,
            Metric::MotionIntensity => self.motion_intensity,
            Metric::BatteryLevel => self.battery_level,
        }
    }
}

/// Raw ingestion event as delivered by the upstream event source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingEvent {
    pub subject_tag_id: Option<String>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<f64>,
    pub motion_intensity: Option<f64>,
    pub battery_level: Option<f64>,
    /// Epoch milliseconds. Stamped from the clock when absent.
    pub timestamp: Option<i64>,
}

impl ReadingEvent {
    /// Validate the event and turn it into a [`Reading`].
    ///
    /// Fails with [`CoreError::Validation`] when the tag id is missing or
    /// blank, when the timestamp is out of range, or when a metric is not a
    /// finite number.
    pub fn into_reading(self, clock: &dyn Clock) -> Result<Reading, CoreError> {
        let subject_tag_id = match self.subject_tag_id.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => {
                return Err(CoreError::Validation(
                    "subjectTagId is required".to_string(),
                ))
            }
        };

        let timestamp = match self.timestamp {
            Some(ms) => Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                CoreError::Validation(format!("timestamp {ms} is out of range"))
            })?,
            None => clock.now(),
        };

        let reading = Reading {
            subject_tag_id,
            timestamp,
            temperature: self.temperature,
            pulse_rate: self.pulse_rate,
            motion_intensity: self.motion_intensity,
            battery_level: self.battery_level,
        };

        for metric in Metric::ALL {
            if reading.metric(metric).is_some_and(|v| !v.is_finite()) {
                return Err(CoreError::Validation(format!(
                    "{metric} must be a finite number"
                )));
            }
        }

        Ok(reading)
    }
}
