//! Static threshold rules.
//!
//! A [`RuleSet`] holds at most one [`Rule`] per [`AlertType`]; it is built
//! once at startup and read-only afterwards.

use crate::alert::{AlertType, Severity, ThresholdSnapshot};
use crate::error::CoreError;
use crate::reading::Metric;
use crate::window::Window;

/// How a window is reduced to the single value a rule compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Mean over readings that report the metric.
    Average,
    /// Most recent reported value.
    Last,
}

/// Which side(s) of the bounds count as a breach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    BelowMin(f64),
    AboveMax(f64),
    Between { min: f64, max: f64 },
}

impl Comparison {
    /// The bound `value` violates, if any.
    pub fn violated_bound(&self, value: f64) -> Option<f64> {
        match *self {
            Comparison::BelowMin(min) => (value < min).then_some(min),
            Comparison::AboveMax(max) => (value > max).then_some(max),
            Comparison::Between { min, max } => {
                if value < min {
                    Some(min)
                } else if value > max {
                    Some(max)
                } else {
                    None
                }
            }
        }
    }

    pub fn snapshot(&self) -> ThresholdSnapshot {
        match *self {
            Comparison::BelowMin(min) => ThresholdSnapshot {
                min: Some(min),
                max: None,
            },
            Comparison::AboveMax(max) => ThresholdSnapshot {
                min: None,
                max: Some(max),
            },
            Comparison::Between { min, max } => ThresholdSnapshot {
                min: Some(min),
                max: Some(max),
            },
        }
    }

    fn bounds(&self) -> Vec<f64> {
        match *self {
            Comparison::BelowMin(b) | Comparison::AboveMax(b) => vec![b],
            Comparison::Between { min, max } => vec![min, max],
        }
    }
}

/// Maps a breaching value to a severity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeverityScale {
    /// Absolute distance from the violated bound: strictly above `high` is
    /// high, strictly above `medium` is medium.
    Deviation { high: f64, medium: f64 },
    /// Multiple of the violated bound: strictly above `high` is high, strictly
    /// above `medium` is medium.
    Ratio { high: f64, medium: f64 },
    /// The value itself: below `high_below` is high, below `medium_below` is
    /// medium.
    Absolute { high_below: f64, medium_below: f64 },
}

impl SeverityScale {
    pub fn grade(&self, value: f64, bound: f64) -> Severity {
        match *self {
            SeverityScale::Deviation { high, medium } => {
                let deviation = (value - bound).abs();
                if deviation > high {
                    Severity::High
                } else if deviation > medium {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            }
            SeverityScale::Ratio { high, medium } => {
                let ratio = value / bound;
                if ratio > high {
                    Severity::High
                } else if ratio > medium {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            }
            SeverityScale::Absolute {
                high_below,
                medium_below,
            } => {
                if value < high_below {
                    Severity::High
                } else if value < medium_below {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub alert_type: AlertType,
    pub metric: Metric,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub severity: SeverityScale,
}

impl Rule {
    /// Reduce `window` to the value this rule compares, if any reading
    /// supplies the metric.
    pub fn aggregate(&self, window: &Window) -> Option<f64> {
        match self.aggregation {
            Aggregation::Average => window.average(self.metric),
            Aggregation::Last => window.last_value(self.metric),
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        let bounds = self.comparison.bounds();
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(CoreError::Validation(format!(
                "{} rule bounds must be finite",
                self.alert_type
            )));
        }
        if let Comparison::Between { min, max } = self.comparison {
            if min >= max {
                return Err(CoreError::Validation(format!(
                    "{} rule min must be less than max",
                    self.alert_type
                )));
            }
        }
        if matches!(self.severity, SeverityScale::Ratio { .. }) && bounds.iter().any(|b| *b <= 0.0)
        {
            return Err(CoreError::Validation(format!(
                "{} rule uses a ratio scale and needs positive bounds",
                self.alert_type
            )));
        }
        Ok(())
    }
}

/// The rule table, one rule per alert type.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set, rejecting duplicate alert types and malformed bounds.
    pub fn new(rules: Vec<Rule>) -> Result<Self, CoreError> {
        for (i, rule) in rules.iter().enumerate() {
            rule.validate()?;
            if rules[..i].iter().any(|r| r.alert_type == rule.alert_type) {
                return Err(CoreError::Validation(format!(
                    "duplicate rule for {}",
                    rule.alert_type
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, alert_type: AlertType) -> Option<&Rule> {
        self.rules.iter().find(|r| r.alert_type == alert_type)
    }
}

impl Default for RuleSet {
    /// Bovine defaults: body temperature 37.5-39.5 °C, resting pulse 40-80
    /// bpm, motion intensity up to 5.0 and a 20 % battery floor.
    fn default() -> Self {
        Self {
            rules: vec![
                Rule {
                    alert_type: AlertType::Temperature,
                    metric: Metric::Temperature,
                    aggregation: Aggregation::Average,
                    comparison: Comparison::Between {
                        min: 37.5,
                        max: 39.5,
                    },
                    severity: SeverityScale::Deviation {
                        high: 1.5,
                        medium: 0.5,
                    },
                },
                Rule {
                    alert_type: AlertType::PulseRate,
                    metric: Metric::PulseRate,
                    aggregation: Aggregation::Average,
                    comparison: Comparison::Between {
                        min: 40.0,
                        max: 80.0,
                    },
                    severity: SeverityScale::Deviation {
                        high: 15.0,
                        medium: 5.0,
                    },
                },
                Rule {
                    alert_type: AlertType::Motion,
                    metric: Metric::MotionIntensity,
                    aggregation: Aggregation::Average,
                    comparison: Comparison::AboveMax(5.0),
                    severity: SeverityScale::Ratio {
                        high: 2.0,
                        medium: 1.5,
                    },
                },
                Rule {
                    alert_type: AlertType::Battery,
                    metric: Metric::BatteryLevel,
                    aggregation: Aggregation::Last,
                    comparison: Comparison::BelowMin(20.0),
                    severity: SeverityScale::Absolute {
                        high_below: 10.0,
                        medium_below: 15.0,
                    },
                },
            ],
        }
    }
}
