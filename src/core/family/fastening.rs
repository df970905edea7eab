//! Fastening family pipeline
//!
//! Fastening executions live in one legacy curve view keyed by a monotonic
//! autoindex, with program metadata and scalar KPIs in side tables. The curve
//! payload is the fixed-frame variant: every sample carries its program step,
//! so steps are partitioned by the embedded index and their time windows are
//! proportional slices of the execution duration.

use crate::adapters::postgres::source::{
    self, FasteningProgramRow, FasteningRow, KpiRow,
};
use crate::adapters::postgres::{writer, PostgresClient};
use crate::core::decode::{decode_frames, FrameFormat, FrameSample};
use crate::core::engine::outcome::ItemOutcome;
use crate::core::family::offset_time;
use crate::core::family::traits::FamilyPipeline;
use crate::domain::aggregate::{
    AlarmEvent, CurveSeries, Program, ResultAggregate, ResultRecord, StepRecord, TestStatus,
};
use crate::domain::errors::SourceError;
use crate::domain::ids::Family;
use crate::domain::{AnvilError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Parameter type written for fastening programs; the family has one
/// limit-set per program, not one per measured parameter.
const PARAMETER_TYPE: &str = "DEFAULT";

/// Fastening family pipeline.
pub struct FasteningPipeline {
    family: Family,
    client: Arc<PostgresClient>,
    format: FrameFormat,
}

impl FasteningPipeline {
    /// Create a pipeline bound to a connection pool.
    pub fn new(client: Arc<PostgresClient>, family: Family) -> Self {
        Self {
            family,
            client,
            format: FrameFormat::FASTENING,
        }
    }

    async fn migrate(&self, offset: i64) -> Result<ItemOutcome> {
        let mut conn = self.client.get().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| AnvilError::Transaction(e.to_string()))?;
        let pg: &tokio_postgres::Transaction<'_> = &tx;

        if writer::already_migrated(pg, offset, &self.family).await? {
            return Ok(ItemOutcome::AlreadyMigrated);
        }

        let record = source::fetch_fastening_record(pg, offset)
            .await?
            .ok_or(SourceError::NotFound(offset))?;
        let program = source::fetch_fastening_program(pg, record.program_ref).await?;
        let kpis = source::fetch_fastening_kpis(pg, offset).await?;

        let samples: Vec<FrameSample> = match decode_frames(record.curve.clone(), self.format) {
            Ok(iter) => iter.collect(),
            Err(e) => {
                tracing::warn!(
                    family = %self.family,
                    offset,
                    error = %e,
                    "Curve payload undecodable, persisting record without curves"
                );
                Vec::new()
            }
        };

        let aggregate = normalize(&self.family, &record, program.as_ref(), &kpis, &samples);
        writer::persist(pg, &aggregate).await?;
        tx.commit()
            .await
            .map_err(|e| AnvilError::Transaction(e.to_string()))?;

        Ok(ItemOutcome::Migrated)
    }
}

#[async_trait]
impl FamilyPipeline for FasteningPipeline {
    fn family(&self) -> &Family {
        &self.family
    }

    async fn next_batch(&self, after_offset: i64, limit: i64) -> Result<Vec<i64>> {
        let conn = self.client.get().await?;
        let client: &tokio_postgres::Client = &conn;
        source::fastening_batch_keys(client, after_offset, limit).await
    }

    async fn process_item(&self, offset: i64) -> ItemOutcome {
        match self.migrate(offset).await {
            Ok(outcome) => outcome,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }
}

/// Build the normalized aggregate for one fastening execution.
///
/// Pure with respect to the database: everything the record, program row,
/// KPIs and decoded samples say is folded into one [`ResultAggregate`].
pub(crate) fn normalize(
    family: &Family,
    record: &FasteningRow,
    program: Option<&FasteningProgramRow>,
    kpis: &[KpiRow],
    samples: &[FrameSample],
) -> ResultAggregate {
    let program_code = program
        .and_then(|p| p.start_string.clone())
        .unwrap_or_else(|| record.program_ref.to_string());
    let program_version = program
        .and_then(|p| p.last_changed)
        .map(|ts| ts.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let program_name = program.and_then(|p| p.name.clone());

    let status = TestStatus::from_code(record.ok_nok_code);
    let start_time = record.start_time;
    let end_time = offset_time(start_time, record.duration);

    // Group samples and KPIs by step
    let mut points_by_step: BTreeMap<i32, Vec<&FrameSample>> = BTreeMap::new();
    for sample in samples {
        points_by_step.entry(sample.step).or_default().push(sample);
    }
    let mut kpis_by_step: BTreeMap<i32, Vec<&KpiRow>> = BTreeMap::new();
    for kpi in kpis {
        kpis_by_step.entry(kpi.step).or_default().push(kpi);
    }

    let mut all_steps: BTreeSet<i32> = points_by_step.keys().copied().collect();
    all_steps.extend(kpis_by_step.keys().copied());

    // Fallback: no step shows up anywhere, but the controller reports how
    // far the program got - synthesize the executed steps.
    let last_step = record.last_step.unwrap_or(0);
    if all_steps.is_empty() && last_step > 0 {
        all_steps.extend(1..=last_step);
    }

    let total_points = samples.len();
    let time_per_point = if total_points > 0 {
        record.duration / total_points as f64
    } else {
        0.0
    };

    let mut steps = Vec::with_capacity(all_steps.len());
    let mut consumed_points = 0usize;

    for step_index in all_steps {
        let points: &[&FrameSample] = points_by_step
            .get(&step_index)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let count = points.len();

        // Proportional window from the cumulative sample-count fraction;
        // sample-less steps span the whole execution.
        let (step_start, step_end) = if count > 0 {
            (
                offset_time(start_time, consumed_points as f64 * time_per_point),
                offset_time(start_time, (consumed_points + count) as f64 * time_per_point),
            )
        } else {
            (start_time, end_time)
        };

        let curves = build_step_curves(points, consumed_points, time_per_point);

        let key_value = kpis_by_step
            .get(&step_index)
            .and_then(|list| list.first())
            .map_or(0.0, |kpi| kpi.value);

        // A failing result faults only the step the program stopped on
        let outcome = if status.is_fail() && step_index == last_step {
            TestStatus::Fail
        } else {
            TestStatus::Pass
        };

        let alarm = if outcome.is_fail() {
            Some(AlarmEvent::root(
                record.ok_nok_code.to_string(),
                alarm_message(record.ok_nok_code),
                record.system_id.clone(),
            ))
        } else {
            None
        };

        steps.push(StepRecord {
            index: step_index,
            name: format!("Step {step_index}"),
            outcome,
            key_value,
            target_value: None,
            start_time: step_start,
            end_time: step_end,
            curves,
            alarm,
        });

        consumed_points += count;
    }

    let extension = json!({
        "single_results": kpis
            .iter()
            .map(|k| json!({
                "type": k.kind,
                "value": k.value,
                "result_index": k.result_index,
            }))
            .collect::<Vec<_>>(),
        "origin_info": {
            "program_selection": record.program_selection,
            "start_selection": record.start_selection,
            "last_executed_step": record.last_step,
        },
    });

    ResultAggregate {
        family: family.clone(),
        result: ResultRecord {
            source_id: record.offset,
            cycle_number: record.cycle_number.clone(),
            device_name: record.system_id.clone(),
            system_id: record.system_id.clone(),
            serial_number: record.serial_number.clone(),
            program_id: program_code.clone(),
            status,
            start_time,
            end_time,
            cycle_time: record.duration,
            key_value: None,
        },
        programs: vec![Program {
            program_id: program_code,
            version: program_version,
            name: program_name,
            device_type: record.system_id.clone(),
            parameter_type: PARAMETER_TYPE.to_string(),
            target_value: None,
            upper_limit: None,
            lower_limit: None,
        }],
        primary_parameter: PARAMETER_TYPE.to_string(),
        steps,
        extension,
    }
}

/// Derive the per-channel curves (plus the torque-over-angle cross-plot)
/// from one step's samples.
fn build_step_curves(
    points: &[&FrameSample],
    consumed_points: usize,
    time_per_point: f64,
) -> Vec<CurveSeries> {
    if points.is_empty() {
        return Vec::new();
    }

    let times: Vec<f64> = (0..points.len())
        .map(|i| {
            let t = (consumed_points + i) as f64 * time_per_point;
            (t * 10_000.0).round() / 10_000.0
        })
        .collect();
    let torques: Vec<f64> = points.iter().map(|p| p.torque).collect();
    let speeds: Vec<f64> = points.iter().map(|p| f64::from(p.speed_actual)).collect();
    let angles: Vec<f64> = points.iter().map(|p| p.angle).collect();
    let depths: Vec<f64> = points.iter().map(|p| p.depth).collect();
    let pressures: Vec<f64> = points.iter().map(|p| p.pressure_actual).collect();

    vec![
        CurveSeries::new("TORQUE", times.clone(), torques.clone()),
        CurveSeries::new("SPEED", times.clone(), speeds),
        CurveSeries::new("ANGLE", times.clone(), angles.clone()),
        CurveSeries::new("DEPTH", times.clone(), depths),
        CurveSeries::new("PRESSURE", times, pressures),
        // Cross-plot: torque over angle, from the same samples
        CurveSeries::new("TORQUE_ANGLE", angles, torques),
    ]
}

/// Resolve a fastening ok/nok code to its human-readable message.
///
/// Unknown codes render as "unknown code: N" and are never dropped.
pub(crate) fn alarm_message(code: i32) -> String {
    let message = match code {
        0 => "empty result",
        10 => "minimum torque not reached",
        11 => "maximum torque exceeded",
        12 => "threshold torque not reached",
        13 => "loosening torque error",
        30 => "minimum filtered torque not reached",
        31 => "maximum filtered torque exceeded",
        40 => "maximum torque gradient not reached",
        41 => "maximum torque gradient exceeded",
        50 => "minimum angle not reached",
        51 => "maximum angle exceeded",
        60 => "minimum time not reached",
        61 => "maximum time exceeded",
        70 => "minimum depth not reached",
        71 => "maximum depth exceeded",
        75 => "minimum depth gradient not reached",
        76 => "maximum depth gradient exceeded",
        110 => "failure caused by final stage",
        200 => "program terminated unexpectedly",
        202 => "hardware fault",
        203 => "total fastening time exceeded",
        204 => "start aborted",
        other => return format!("unknown code: {other}"),
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn family() -> Family {
        Family::from_str("fastening").unwrap()
    }

    fn sample(step: i32, torque: f64, angle: f64) -> FrameSample {
        FrameSample {
            speed_set: 1000,
            speed_actual: 990,
            torque,
            torque_filtered: torque,
            torque_gradient: 0.0,
            depth: 1.0,
            depth_gradient: 0.0,
            angle,
            pressure_set: 5.0,
            pressure_actual: 4.9,
            step,
        }
    }

    fn record(ok_nok: i32, last_step: Option<i32>, duration: f64) -> FasteningRow {
        FasteningRow {
            offset: 56872,
            program_ref: 12,
            system_id: Some("SYS-7".into()),
            start_selection: Some("IO-1".into()),
            ok_nok_code: ok_nok,
            last_step,
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            cycle_number: "1042".into(),
            duration,
            serial_number: Some("BSN-99".into()),
            program_selection: Some("P-2".into()),
            curve: None,
        }
    }

    #[test]
    fn test_partition_into_steps() {
        let samples: Vec<FrameSample> = [1, 1, 2, 2, 2, 3]
            .iter()
            .map(|&s| sample(s, 1.0, 10.0))
            .collect();
        let rec = record(1, Some(3), 6.0);

        let aggregate = normalize(&family(), &rec, None, &[], &samples);

        assert_eq!(aggregate.steps.len(), 3);
        let steps = &aggregate.steps;
        assert_eq!(steps[0].index, 1);
        assert_eq!(steps[1].index, 2);
        assert_eq!(steps[2].index, 3);

        // Contiguous, non-overlapping windows spanning the whole duration
        assert_eq!(steps[0].start_time, rec.start_time);
        assert_eq!(steps[0].end_time, steps[1].start_time);
        assert_eq!(steps[1].end_time, steps[2].start_time);
        assert_eq!(steps[2].end_time, offset_time(rec.start_time, 6.0));

        // 2/6, 3/6 and 1/6 of the duration respectively
        assert_eq!(
            (steps[0].end_time - steps[0].start_time).num_milliseconds(),
            2000
        );
        assert_eq!(
            (steps[1].end_time - steps[1].start_time).num_milliseconds(),
            3000
        );
        assert_eq!(
            (steps[2].end_time - steps[2].start_time).num_milliseconds(),
            1000
        );
    }

    #[test]
    fn test_step_curves_and_cross_plot() {
        let samples = vec![sample(1, 2.5, 90.0), sample(1, 3.5, 180.0)];
        let rec = record(1, Some(1), 2.0);

        let aggregate = normalize(&family(), &rec, None, &[], &samples);
        assert_eq!(aggregate.steps.len(), 1);

        let curves = &aggregate.steps[0].curves;
        let types: Vec<&str> = curves.iter().map(|c| c.curve_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["TORQUE", "SPEED", "ANGLE", "DEPTH", "PRESSURE", "TORQUE_ANGLE"]
        );

        let torque = &curves[0];
        assert_eq!(torque.x, vec![0.0, 1.0]);
        assert_eq!(torque.y, vec![2.5, 3.5]);

        // Cross-plot pairs angle (x) with torque (y) from the same samples
        let cross = &curves[5];
        assert_eq!(cross.x, vec![90.0, 180.0]);
        assert_eq!(cross.y, vec![2.5, 3.5]);
    }

    #[test]
    fn test_failing_result_faults_last_step_only() {
        let samples: Vec<FrameSample> =
            [1, 2].iter().map(|&s| sample(s, 1.0, 1.0)).collect();
        let rec = record(11, Some(2), 2.0);

        let aggregate = normalize(&family(), &rec, None, &[], &samples);

        assert_eq!(aggregate.result.status, TestStatus::Fail);
        assert_eq!(aggregate.steps[0].outcome, TestStatus::Pass);
        assert!(aggregate.steps[0].alarm.is_none());
        assert_eq!(aggregate.steps[1].outcome, TestStatus::Fail);

        let alarm = aggregate.steps[1].alarm.as_ref().unwrap();
        assert_eq!(alarm.code, "11");
        assert_eq!(alarm.message, "maximum torque exceeded");
        assert_eq!(alarm.device_id.as_deref(), Some("SYS-7"));
        assert!(alarm.parent_alarm_id.is_none());
    }

    #[test]
    fn test_fallback_steps_from_last_executed() {
        let rec = record(200, Some(3), 4.5);
        let aggregate = normalize(&family(), &rec, None, &[], &[]);

        let indices: Vec<i32> = aggregate.steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        // Sample-less steps span the whole execution
        for step in &aggregate.steps {
            assert_eq!(step.start_time, rec.start_time);
            assert_eq!(step.end_time, offset_time(rec.start_time, 4.5));
            assert!(step.curves.is_empty());
        }
    }

    #[test]
    fn test_kpi_becomes_step_key_value() {
        let samples = vec![sample(1, 1.0, 1.0)];
        let kpis = vec![
            KpiRow {
                kind: "torque".into(),
                step: 1,
                value: 12.75,
                result_index: 0,
            },
            KpiRow {
                kind: "angle".into(),
                step: 1,
                value: 360.0,
                result_index: 1,
            },
        ];
        let rec = record(1, Some(1), 1.0);

        let aggregate = normalize(&family(), &rec, None, &kpis, &samples);
        assert_eq!(aggregate.steps[0].key_value, 12.75);

        let singles = aggregate.extension["single_results"].as_array().unwrap();
        assert_eq!(singles.len(), 2);
        assert_eq!(singles[0]["type"], "torque");
    }

    #[test]
    fn test_program_metadata_resolution() {
        let rec = record(1, Some(1), 1.0);
        let prog = FasteningProgramRow {
            name: Some("M8 screw".into()),
            last_changed: Some(Utc.with_ymd_and_hms(2023, 12, 24, 13, 45, 6).unwrap()),
            start_string: Some("P-0042".into()),
        };

        let aggregate = normalize(&family(), &rec, Some(&prog), &[], &[]);
        let program = &aggregate.programs[0];
        assert_eq!(program.program_id, "P-0042");
        assert_eq!(program.version, "20231224134506");
        assert_eq!(program.name.as_deref(), Some("M8 screw"));
        assert_eq!(aggregate.result.program_id, "P-0042");
    }

    #[test]
    fn test_program_metadata_fallback() {
        let rec = record(1, Some(1), 1.0);
        let aggregate = normalize(&family(), &rec, None, &[], &[]);

        let program = &aggregate.programs[0];
        assert_eq!(program.program_id, "12");
        assert_eq!(program.version, "unknown");
        assert!(program.name.is_none());
    }

    #[test]
    fn test_alarm_message_known_codes() {
        assert_eq!(alarm_message(10), "minimum torque not reached");
        assert_eq!(alarm_message(204), "start aborted");
    }

    #[test]
    fn test_alarm_message_unknown_code() {
        assert_eq!(alarm_message(999), "unknown code: 999");
        assert_eq!(alarm_message(-5), "unknown code: -5");
    }
}
