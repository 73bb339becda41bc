//! Per-subject bounded windows of recent readings.
//!
//! The [`WindowStore`] is a volatile, per-process cache: nothing survives a
//! restart and nothing is shared between instances. Running more than one
//! ingesting instance means each sees only the readings routed to it. If that
//! ever matters, the windows have to move into a store keyed by subject with
//! idempotent upserts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::clock::Clock;
use crate::reading::{Metric, Reading};
use crate::types::Timestamp;

/// Number of readings a full window holds.
pub const DEFAULT_WINDOW_CAPACITY: usize = 12;

/// Time-ordered buffer of a subject's most recent readings (oldest first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    readings: VecDeque<Reading>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Most recently ingested reading.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Mean of `metric` over the readings that report it.
    ///
    /// Readings without the metric are skipped rather than counted as zero;
    /// returns `None` when no reading supplies it.
    pub fn average(&self, metric: Metric) -> Option<f64> {
        let (sum, count) = self
            .readings
            .iter()
            .filter_map(|r| r.metric(metric))
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Most recent reported value of `metric`.
    pub fn last_value(&self, metric: Metric) -> Option<f64> {
        self.readings.iter().rev().find_map(|r| r.metric(metric))
    }

    fn push(&mut self, reading: Reading, capacity: usize) {
        self.readings.push_back(reading);
        while self.readings.len() > capacity {
            self.readings.pop_front();
        }
    }
}

/// Result of [`WindowStore::ingest`].
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Snapshot of the window after the reading was applied.
    pub window: Window,
    /// The window holds `capacity` readings and should be evaluated.
    pub is_full: bool,
    /// An identical reading was already buffered (upstream redelivery); the
    /// window was left untouched.
    pub duplicate: bool,
}

struct Slot {
    window: Window,
    last_ingest_at: Timestamp,
}

/// Owns every subject's [`Window`], keyed by subject tag.
pub struct WindowStore {
    capacity: usize,
    clock: Arc<dyn Clock>,
    windows: HashMap<String, Slot>,
}

impl WindowStore {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `reading` to the subject's window in arrival order, evicting the
    /// oldest entry once the window exceeds capacity.
    ///
    /// A reading equal to one already buffered (same timestamp and values) is
    /// treated as a redelivery and not appended again.
    pub fn ingest(&mut self, subject_key: &str, reading: Reading) -> IngestOutcome {
        let now = self.clock.now();
        let capacity = self.capacity;

        let slot = self
            .windows
            .entry(subject_key.to_string())
            .or_insert_with(|| Slot {
                window: Window::default(),
                last_ingest_at: now,
            });
        slot.last_ingest_at = now;

        let duplicate = slot.window.iter().any(|r| *r == reading);
        if duplicate {
            tracing::debug!(
                subject_key,
                timestamp = %reading.timestamp,
                "Duplicate reading ignored"
            );
        } else {
            slot.window.push(reading, capacity);
        }

        IngestOutcome {
            is_full: slot.window.len() >= capacity,
            window: slot.window.clone(),
            duplicate,
        }
    }

    pub fn window(&self, subject_key: &str) -> Option<&Window> {
        self.windows.get(subject_key).map(|slot| &slot.window)
    }

    /// Number of subjects with a buffered window.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop windows that have not received a reading for longer than
    /// `max_idle`. Returns how many were dropped.
    pub fn evict_idle(&mut self, max_idle: chrono::Duration) -> usize {
        let cutoff = self.clock.now() - max_idle;
        let before = self.windows.len();
        self.windows.retain(|_, slot| slot.last_ingest_at >= cutoff);
        before - self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn reading(minute: i64) -> Reading {
        Reading {
            subject_tag_id: "TAG-1".into(),
            timestamp: start() + Duration::minutes(minute),
            temperature: Some(38.0 + minute as f64 / 100.0),
            pulse_rate: None,
            motion_intensity: None,
            battery_level: None,
        }
    }

    fn store(clock: Arc<ManualClock>) -> WindowStore {
        WindowStore::new(DEFAULT_WINDOW_CAPACITY, clock)
    }

    #[test]
    fn window_never_exceeds_capacity_and_keeps_newest() {
        let mut store = store(Arc::new(ManualClock::new(start())));

        for minute in 0..30 {
            let outcome = store.ingest("TAG-1", reading(minute));
            assert!(outcome.window.len() <= DEFAULT_WINDOW_CAPACITY);
            assert_eq!(outcome.is_full, minute + 1 >= DEFAULT_WINDOW_CAPACITY as i64);
        }

        let window = store.window("TAG-1").unwrap();
        let minutes: Vec<i64> = window
            .iter()
            .map(|r| (r.timestamp - start()).num_minutes())
            .collect();
        assert_eq!(minutes, (18..30).collect::<Vec<_>>());
    }

    #[test]
    fn windows_are_independent_per_subject() {
        let mut store = store(Arc::new(ManualClock::new(start())));
        for minute in 0..12 {
            store.ingest("TAG-1", reading(minute));
        }
        let outcome = store.ingest("TAG-2", reading(0));
        assert_eq!(outcome.window.len(), 1);
        assert!(!outcome.is_full);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn redelivered_reading_is_not_appended_twice() {
        let mut store = store(Arc::new(ManualClock::new(start())));
        store.ingest("TAG-1", reading(0));
        let outcome = store.ingest("TAG-1", reading(0));
        assert!(outcome.duplicate);
        assert_eq!(outcome.window.len(), 1);
    }

    #[test]
    fn average_ignores_absent_values() {
        let mut store = store(Arc::new(ManualClock::new(start())));
        let mut r = reading(0);
        r.pulse_rate = Some(60.0);
        store.ingest("TAG-1", r);
        let mut r = reading(1);
        r.pulse_rate = None;
        store.ingest("TAG-1", r);
        let mut r = reading(2);
        r.pulse_rate = Some(70.0);
        let outcome = store.ingest("TAG-1", r);

        assert_eq!(outcome.window.average(Metric::PulseRate), Some(65.0));
        assert_eq!(outcome.window.average(Metric::MotionIntensity), None);
    }

    #[test]
    fn last_value_skips_readings_without_the_metric() {
        let mut store = store(Arc::new(ManualClock::new(start())));
        let mut r = reading(0);
        r.battery_level = Some(18.0);
        store.ingest("TAG-1", r);
        let outcome = store.ingest("TAG-1", reading(1));

        assert_eq!(outcome.window.last_value(Metric::BatteryLevel), Some(18.0));
        assert_eq!(outcome.window.latest().unwrap().battery_level, None);
    }

    #[test]
    fn evict_idle_drops_silent_subjects() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut store = store(Arc::clone(&clock));
        store.ingest("TAG-1", reading(0));
        clock.advance(Duration::hours(2));
        store.ingest("TAG-2", reading(0));

        assert_eq!(store.evict_idle(Duration::hours(1)), 1);
        assert!(store.window("TAG-1").is_none());
        assert!(store.window("TAG-2").is_some());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut store = WindowStore::new(0, Arc::new(ManualClock::new(start())));
        let outcome = store.ingest("TAG-1", reading(0));
        assert_eq!(store.capacity(), 1);
        assert!(outcome.is_full);
    }
}
