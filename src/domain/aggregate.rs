//! Normalized result aggregate
//!
//! This module defines the business-schema aggregate a family pipeline builds
//! from one grouped source record: the result row itself plus the programs,
//! steps, curves, alarms and extension payload that hang off it. The whole
//! aggregate is persisted in a single transaction by the writer.

use crate::domain::ids::Family;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Pass/fail outcome of a test execution or a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// The execution met its limits
    Pass,
    /// The execution violated a limit or carried no affirmative signal
    Fail,
}

impl TestStatus {
    /// Status code as stored in the normalized schema (1 = pass, 0 = fail)
    pub fn as_code(&self) -> i16 {
        match self {
            TestStatus::Pass => 1,
            TestStatus::Fail => 0,
        }
    }

    /// Whether this status is a failure
    pub fn is_fail(&self) -> bool {
        matches!(self, TestStatus::Fail)
    }

    /// Classify a free-text result description, fail-closed.
    ///
    /// An explicit negative token (`NOT`, `NOK`) forces fail even when other
    /// signals are ambiguous; an affirmative `OK` passes; anything else -
    /// including a missing description - is a fail. Records never pass by
    /// default.
    pub fn from_description(description: Option<&str>) -> Self {
        match description {
            Some(text) => {
                let upper = text.to_uppercase();
                if upper.contains("NOT") || upper.contains("NOK") {
                    TestStatus::Fail
                } else if upper.contains("OK") {
                    TestStatus::Pass
                } else {
                    TestStatus::Fail
                }
            }
            None => TestStatus::Fail,
        }
    }

    /// Classify a numeric ok/nok status code (1 = pass, anything else = fail)
    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        }
    }
}

/// A test recipe/limit-set identified by (program_id, version, parameter_type).
///
/// Programs are deduplicated in the target store: the first writer wins and
/// later writers resolve the existing surrogate id. Rows are immutable once
/// created.
#[derive(Debug, Clone)]
pub struct Program {
    /// External program identifier (string form of the legacy id)
    pub program_id: String,
    /// Program version label
    pub version: String,
    /// Human-readable program name, when the source knows one
    pub name: Option<String>,
    /// Device type/model the program runs on
    pub device_type: Option<String>,
    /// Measured parameter this limit-set applies to
    pub parameter_type: String,
    /// Nominal target value
    pub target_value: Option<f64>,
    /// Upper limit
    pub upper_limit: Option<f64>,
    /// Lower limit
    pub lower_limit: Option<f64>,
}

impl Program {
    /// Midpoint target for a limit pair; `None` unless both bounds are
    /// present and non-zero (a zero bound means "unset" in the source).
    pub fn target_from_limits(upper: Option<f64>, lower: Option<f64>) -> Option<f64> {
        match (upper, lower) {
            (Some(hi), Some(lo)) if hi != 0.0 && lo != 0.0 => Some((hi + lo) / 2.0),
            _ => None,
        }
    }
}

/// One named time series bound to a result and a step index.
#[derive(Debug, Clone)]
pub struct CurveSeries {
    /// Curve type label (TORQUE, SPEED, FORCE, ...)
    pub curve_type: String,
    /// X axis values (seconds from result start, or the paired channel for
    /// a cross-plot)
    pub x: Vec<f64>,
    /// Y axis values; always the same length as `x`
    pub y: Vec<f64>,
}

impl CurveSeries {
    /// Create a new curve series. `x` and `y` must be the same length.
    pub fn new(curve_type: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len(), "curve axes must have equal length");
        Self {
            curve_type: curve_type.into(),
            x,
            y,
        }
    }

    /// Number of points in the series
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Whether the series holds no points
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// JSON payload stored in the curve row's data_points column
    pub fn data_points(&self) -> Value {
        json!({ "x": self.x, "y": self.y })
    }
}

/// A failure/fault event attached to a result and optionally one step.
///
/// Alarms form a forest: root alarms have no parent, and a parent reference
/// models a cause→effect relationship. The engine itself only emits roots;
/// downstream linking fills in parents. Device attribution is denormalized
/// onto the alarm at write time so consumers never need the extra join.
#[derive(Debug, Clone)]
pub struct AlarmEvent {
    /// Stable alarm code (stringified legacy code or family constant)
    pub code: String,
    /// Severity label
    pub level: String,
    /// Human-readable message resolved from the family's code table
    pub message: String,
    /// Device the alarm originated from
    pub device_id: Option<String>,
    /// Surrogate id of the causing alarm, if linked
    pub parent_alarm_id: Option<i64>,
}

impl AlarmEvent {
    /// Create a root (parentless) error-level alarm
    pub fn root(
        code: impl Into<String>,
        message: impl Into<String>,
        device_id: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            level: "ERROR".to_string(),
            message: message.into(),
            device_id,
            parent_alarm_id: None,
        }
    }
}

/// One phase of a result's execution.
///
/// Step time windows are contiguous and non-overlapping across a result,
/// derived by partitioning the decoded curve into per-step sample counts
/// scaled by total execution duration.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step index within the result
    pub index: i32,
    /// Step display name
    pub name: String,
    /// Pass/fail outcome of this step
    pub outcome: TestStatus,
    /// Scalar key value (first KPI of the step, or the family's key metric)
    pub key_value: f64,
    /// Nominal target for the key value, when known
    pub target_value: Option<f64>,
    /// Step window start
    pub start_time: DateTime<Utc>,
    /// Step window end
    pub end_time: DateTime<Utc>,
    /// Curves derived from this step's samples
    pub curves: Vec<CurveSeries>,
    /// Alarm raised by this step, when failing
    pub alarm: Option<AlarmEvent>,
}

/// The normalized result row.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    /// Natural id of the grouped source record; with the family this forms
    /// the idempotency key
    pub source_id: i64,
    /// Production cycle number
    pub cycle_number: String,
    /// Device that produced the record
    pub device_name: Option<String>,
    /// System/controller identifier
    pub system_id: Option<String>,
    /// Workpiece serial number
    pub serial_number: Option<String>,
    /// External program identifier (string form)
    pub program_id: String,
    /// Overall pass/fail status
    pub status: TestStatus,
    /// Execution start
    pub start_time: DateTime<Utc>,
    /// Execution end
    pub end_time: DateTime<Utc>,
    /// Execution duration in seconds
    pub cycle_time: f64,
    /// Scalar key metric of the whole result, when the family defines one
    pub key_value: Option<f64>,
}

/// The full aggregate persisted for one grouped source record.
#[derive(Debug, Clone)]
pub struct ResultAggregate {
    /// Family this record belongs to
    pub family: Family,
    /// The result row
    pub result: ResultRecord,
    /// Programs to upsert, one per distinct parameter type
    pub programs: Vec<Program>,
    /// Parameter type whose program the result links to; falls back to the
    /// first resolved program when absent
    pub primary_parameter: String,
    /// Steps (with their curves and alarms), ordered by index
    pub steps: Vec<StepRecord>,
    /// Opaque structured payload for source fields without a normalized home
    pub extension: Value,
}

impl ResultAggregate {
    /// The program the result links to: the primary parameter type's entry,
    /// else the first program.
    pub fn primary_program(&self) -> Option<&Program> {
        self.programs
            .iter()
            .find(|p| p.parameter_type == self.primary_parameter)
            .or_else(|| self.programs.first())
    }

    /// Total number of curve rows this aggregate will write
    pub fn curve_count(&self) -> usize {
        self.steps.iter().map(|s| s.curves.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_codes() {
        assert_eq!(TestStatus::Pass.as_code(), 1);
        assert_eq!(TestStatus::Fail.as_code(), 0);
        assert!(TestStatus::Fail.is_fail());
        assert!(!TestStatus::Pass.is_fail());
    }

    #[test]
    fn test_status_from_code() {
        assert_eq!(TestStatus::from_code(1), TestStatus::Pass);
        assert_eq!(TestStatus::from_code(0), TestStatus::Fail);
        assert_eq!(TestStatus::from_code(110), TestStatus::Fail);
    }

    #[test]
    fn test_status_from_description_negative_wins() {
        // NOK contains OK; the negative token must still force a fail
        assert_eq!(
            TestStatus::from_description(Some("Part NOK")),
            TestStatus::Fail
        );
        assert_eq!(
            TestStatus::from_description(Some("not within limits - OK band missed")),
            TestStatus::Fail
        );
    }

    #[test]
    fn test_status_from_description_affirmative() {
        assert_eq!(
            TestStatus::from_description(Some("Result OK")),
            TestStatus::Pass
        );
        assert_eq!(TestStatus::from_description(Some("ok")), TestStatus::Pass);
    }

    #[test]
    fn test_status_from_description_fail_closed() {
        // No signal at all must never pass
        assert_eq!(
            TestStatus::from_description(Some("finished")),
            TestStatus::Fail
        );
        assert_eq!(TestStatus::from_description(Some("")), TestStatus::Fail);
        assert_eq!(TestStatus::from_description(None), TestStatus::Fail);
    }

    #[test]
    fn test_target_from_limits() {
        assert_eq!(Program::target_from_limits(Some(20.0), Some(10.0)), Some(15.0));
        assert_eq!(Program::target_from_limits(Some(20.0), None), None);
        assert_eq!(Program::target_from_limits(Some(20.0), Some(0.0)), None);
        assert_eq!(Program::target_from_limits(None, None), None);
    }

    #[test]
    fn test_curve_data_points() {
        let curve = CurveSeries::new("TORQUE", vec![0.0, 0.1], vec![1.5, 2.5]);
        let payload = curve.data_points();
        assert_eq!(payload["x"], json!([0.0, 0.1]));
        assert_eq!(payload["y"], json!([1.5, 2.5]));
        assert_eq!(curve.len(), 2);
        assert!(!curve.is_empty());
    }

    #[test]
    fn test_alarm_root() {
        let alarm = AlarmEvent::root("11", "maximum torque exceeded", Some("dev-1".into()));
        assert_eq!(alarm.level, "ERROR");
        assert!(alarm.parent_alarm_id.is_none());
        assert_eq!(alarm.device_id.as_deref(), Some("dev-1"));
    }

    #[test]
    fn test_primary_program_selection() {
        let mk = |parameter: &str| Program {
            program_id: "p1".into(),
            version: "1".into(),
            name: None,
            device_type: None,
            parameter_type: parameter.into(),
            target_value: None,
            upper_limit: None,
            lower_limit: None,
        };
        let now = Utc::now();
        let aggregate = ResultAggregate {
            family: Family::from_str("riveting").unwrap(),
            result: ResultRecord {
                source_id: 1,
                cycle_number: "1".into(),
                device_name: None,
                system_id: None,
                serial_number: None,
                program_id: "p1".into(),
                status: TestStatus::Pass,
                start_time: now,
                end_time: now,
                cycle_time: 0.0,
                key_value: None,
            },
            programs: vec![mk("Final Stroke"), mk("Final Force")],
            primary_parameter: "Final Force".to_string(),
            steps: Vec::new(),
            extension: json!({}),
        };

        let primary = aggregate.primary_program().unwrap();
        assert_eq!(primary.parameter_type, "Final Force");
    }

    #[test]
    fn test_primary_program_fallback_to_first() {
        let program = Program {
            program_id: "p1".into(),
            version: "1".into(),
            name: None,
            device_type: None,
            parameter_type: "Velocity".into(),
            target_value: None,
            upper_limit: None,
            lower_limit: None,
        };
        let now = Utc::now();
        let aggregate = ResultAggregate {
            family: Family::from_str("riveting").unwrap(),
            result: ResultRecord {
                source_id: 1,
                cycle_number: "1".into(),
                device_name: None,
                system_id: None,
                serial_number: None,
                program_id: "p1".into(),
                status: TestStatus::Pass,
                start_time: now,
                end_time: now,
                cycle_time: 0.0,
                key_value: None,
            },
            programs: vec![program],
            primary_parameter: "Final Force".to_string(),
            steps: Vec::new(),
            extension: json!({}),
        };

        assert_eq!(
            aggregate.primary_program().unwrap().parameter_type,
            "Velocity"
        );
    }
}
