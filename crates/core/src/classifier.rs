//! Threshold and severity classification.
//!
//! Pure logic: no store access, no clock. The caller aggregates the window
//! and decides what to do with the breaches.

use crate::alert::Breach;
use crate::rules::{Rule, RuleSet};
use crate::window::Window;

/// Compare one aggregated value against one rule.
pub fn evaluate_rule(rule: &Rule, value: f64) -> Option<Breach> {
    let bound = rule.comparison.violated_bound(value)?;
    Some(Breach {
        alert_type: rule.alert_type,
        value,
        threshold: rule.comparison.snapshot(),
        severity: rule.severity.grade(value, bound),
    })
}

/// Evaluate every rule against `window`.
///
/// Yields at most one breach per rule; a metric no reading reports produces
/// nothing.
pub fn classify(window: &Window, rules: &RuleSet) -> Vec<Breach> {
    rules
        .rules()
        .iter()
        .filter_map(|rule| {
            let value = rule.aggregate(window)?;
            evaluate_rule(rule, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::alert::{AlertType, Severity};
    use crate::clock::ManualClock;
    use crate::reading::Reading;
    use crate::window::{WindowStore, DEFAULT_WINDOW_CAPACITY};

    fn blank(i: i64) -> Reading {
        Reading {
            subject_tag_id: "TAG-1".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap() + Duration::minutes(i),
            temperature: None,
            pulse_rate: None,
            motion_intensity: None,
            battery_level: None,
        }
    }

    fn window_of(readings: impl IntoIterator<Item = Reading>) -> Window {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut store = WindowStore::new(DEFAULT_WINDOW_CAPACITY, clock);
        let mut last = None;
        for r in readings {
            last = Some(store.ingest("TAG-1", r).window);
        }
        last.unwrap_or_default()
    }

    fn temperatures(avg: f64) -> Window {
        window_of((0..12).map(|i| {
            let mut r = blank(i);
            // Alternate around the mean so the average is exact.
            r.temperature = Some(if i % 2 == 0 { avg + 0.1 } else { avg - 0.1 });
            r
        }))
    }

    fn rule(alert_type: AlertType) -> Rule {
        RuleSet::default().get(alert_type).cloned().unwrap()
    }

    #[test]
    fn slight_fever_is_low_severity() {
        let breaches = classify(&temperatures(39.8), &RuleSet::default());
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].alert_type, AlertType::Temperature);
        assert_eq!(breaches[0].severity, Severity::Low);
        assert_eq!(breaches[0].threshold.max, Some(39.5));
        assert!((breaches[0].value - 39.8).abs() < 1e-9);
    }

    #[test]
    fn high_fever_is_high_severity() {
        let breaches = classify(&temperatures(41.2), &RuleSet::default());
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].severity, Severity::High);
    }

    #[test]
    fn hypothermia_is_graded_from_the_min_bound() {
        let breach = evaluate_rule(&rule(AlertType::Temperature), 36.8).unwrap();
        // 0.7 below 37.5
        assert_eq!(breach.severity, Severity::Medium);
        assert_eq!(breach.threshold.min, Some(37.5));
    }

    #[test]
    fn normal_window_yields_nothing() {
        assert!(classify(&temperatures(38.6), &RuleSet::default()).is_empty());
    }

    #[test]
    fn pulse_rate_cutoffs() {
        let r = rule(AlertType::PulseRate);
        assert_eq!(evaluate_rule(&r, 84.0).unwrap().severity, Severity::Low);
        assert_eq!(evaluate_rule(&r, 90.0).unwrap().severity, Severity::Medium);
        assert_eq!(evaluate_rule(&r, 96.0).unwrap().severity, Severity::High);
        assert_eq!(evaluate_rule(&r, 30.0).unwrap().severity, Severity::Medium);
        assert!(evaluate_rule(&r, 60.0).is_none());
    }

    #[test]
    fn motion_is_graded_by_ratio() {
        let r = rule(AlertType::Motion);
        assert!(evaluate_rule(&r, 5.0).is_none());
        assert_eq!(evaluate_rule(&r, 7.0).unwrap().severity, Severity::Low);
        assert_eq!(evaluate_rule(&r, 8.0).unwrap().severity, Severity::Medium);
        assert_eq!(evaluate_rule(&r, 10.5).unwrap().severity, Severity::High);
        // Below-min never breaches an above-max rule.
        assert!(evaluate_rule(&r, 0.0).is_none());
    }

    #[test]
    fn battery_is_graded_by_absolute_level() {
        let r = rule(AlertType::Battery);
        assert!(evaluate_rule(&r, 20.0).is_none());
        assert_eq!(evaluate_rule(&r, 17.0).unwrap().severity, Severity::Low);
        assert_eq!(evaluate_rule(&r, 12.0).unwrap().severity, Severity::Medium);
        assert_eq!(evaluate_rule(&r, 5.0).unwrap().severity, Severity::High);
    }

    #[test]
    fn battery_uses_last_reported_value_not_average() {
        let window = window_of((0..12).map(|i| {
            let mut r = blank(i);
            r.temperature = Some(38.5);
            // Low early, recovered by the last report, then silent.
            r.battery_level = match i {
                0..=5 => Some(5.0),
                6 => Some(60.0),
                _ => None,
            };
            r
        }));
        let breaches = classify(&window, &RuleSet::default());
        assert!(breaches.iter().all(|b| b.alert_type != AlertType::Battery));
    }

    #[test]
    fn missing_battery_reports_do_not_zero_the_level() {
        let window = window_of((0..12).map(|i| {
            let mut r = blank(i);
            r.battery_level = (i == 3).then_some(45.0);
            r
        }));
        assert_eq!(window.last_value(crate::reading::Metric::BatteryLevel), Some(45.0));
        assert!(classify(&window, &RuleSet::default()).is_empty());
    }

    #[test]
    fn one_breach_per_metric() {
        let window = window_of((0..12).map(|i| {
            let mut r = blank(i);
            r.temperature = Some(41.0);
            r.pulse_rate = Some(100.0);
            r.motion_intensity = Some(12.0);
            r.battery_level = Some(8.0);
            r
        }));
        let mut types: Vec<AlertType> = classify(&window, &RuleSet::default())
            .into_iter()
            .map(|b| b.alert_type)
            .collect();
        types.sort_by_key(|t| t.as_str());
        assert_eq!(
            types,
            vec![
                AlertType::Battery,
                AlertType::Motion,
                AlertType::PulseRate,
                AlertType::Temperature
            ]
        );
    }
}
