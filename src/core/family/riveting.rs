//! Riveting family pipeline
//!
//! One logical riveting record is split across several source rows sharing an
//! id, one per measured parameter type, each carrying that parameter's limit
//! pair. The curve payloads are compressed float arrays with no embedded
//! step index: the whole execution is a single step, and timestamps are
//! synthesized across the cycle time.

use crate::adapters::postgres::source::{self, GraphRow, RivetingRow};
use crate::adapters::postgres::{writer, PostgresClient};
use crate::core::decode::{decode_packed, time_axis};
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
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// The parameter type whose program a riveting result links to
const PRIMARY_PARAMETER: &str = "Final Force";

/// Alarm code written for failing riveting results
const NOK_ALARM_CODE: &str = "RIVET_NOK";

/// One decoded graph ready for normalization.
#[derive(Debug, Clone)]
pub(crate) struct DecodedGraph {
    /// Source graph type label
    pub graph_type: String,
    /// Decoded sample values
    pub values: Vec<f64>,
}

/// Riveting family pipeline.
pub struct RivetingPipeline {
    family: Family,
    client: Arc<PostgresClient>,
}

impl RivetingPipeline {
    /// Create a pipeline bound to a connection pool.
    pub fn new(client: Arc<PostgresClient>, family: Family) -> Self {
        Self { family, client }
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

        let rows = source::fetch_riveting_rows(pg, offset).await?;
        if rows.is_empty() {
            return Err(SourceError::NotFound(offset).into());
        }
        let graphs = source::fetch_riveting_graphs(pg, offset).await?;
        let decoded = decode_graphs(&self.family, offset, &graphs);

        let aggregate = normalize(&self.family, &rows, &decoded);
        writer::persist(pg, &aggregate).await?;
        tx.commit()
            .await
            .map_err(|e| AnvilError::Transaction(e.to_string()))?;

        Ok(ItemOutcome::Migrated)
    }
}

#[async_trait]
impl FamilyPipeline for RivetingPipeline {
    fn family(&self) -> &Family {
        &self.family
    }

    async fn next_batch(&self, after_offset: i64, limit: i64) -> Result<Vec<i64>> {
        let conn = self.client.get().await?;
        let client: &tokio_postgres::Client = &conn;
        source::riveting_batch_keys(client, after_offset, limit).await
    }

    async fn process_item(&self, offset: i64) -> ItemOutcome {
        match self.migrate(offset).await {
            Ok(outcome) => outcome,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }
}

/// Decode every graph payload, dropping undecodable ones with a warning.
fn decode_graphs(family: &Family, offset: i64, graphs: &[GraphRow]) -> Vec<DecodedGraph> {
    graphs
        .iter()
        .filter_map(|graph| {
            let payload = graph.payload.as_deref()?;
            match decode_packed(payload) {
                Ok(values) if !values.is_empty() => Some(DecodedGraph {
                    graph_type: graph.graph_type.clone(),
                    values,
                }),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        family = %family,
                        offset,
                        graph_type = %graph.graph_type,
                        error = %e,
                        "Graph payload undecodable, skipping curve"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Build the normalized aggregate for one grouped riveting record.
///
/// The first row drives the result fields; every distinct parameter type
/// contributes one program with its limit pair.
pub(crate) fn normalize(
    family: &Family,
    rows: &[RivetingRow],
    graphs: &[DecodedGraph],
) -> ResultAggregate {
    let first = &rows[0];

    let program_id = first
        .program_identifier
        .clone()
        .unwrap_or_else(|| first.program_ref.to_string());
    let program_version = first
        .program_version
        .clone()
        .unwrap_or_else(|| "1".to_string());

    let status = TestStatus::from_description(first.short_description.as_deref());
    let start_time = first.recorded_at;
    let end_time = offset_time(start_time, first.cycle_time);

    // One program per distinct parameter type, first occurrence wins
    let mut programs: Vec<Program> = Vec::new();
    let mut parameter_limits = Map::new();
    for row in rows {
        let parameter_type = row
            .parameter_type
            .clone()
            .unwrap_or_else(|| "DEFAULT".to_string());
        if programs.iter().any(|p| p.parameter_type == parameter_type) {
            continue;
        }
        programs.push(Program {
            program_id: program_id.clone(),
            version: program_version.clone(),
            name: row.program_name.clone(),
            device_type: row.device_name.clone(),
            parameter_type: parameter_type.clone(),
            target_value: Program::target_from_limits(row.limit_high, row.limit_low),
            upper_limit: row.limit_high,
            lower_limit: row.limit_low,
        });
        parameter_limits.insert(
            parameter_type,
            json!({ "limit_high": row.limit_high, "limit_low": row.limit_low }),
        );
    }

    let curves = graphs
        .iter()
        .map(|graph| {
            CurveSeries::new(
                curve_type_label(&graph.graph_type),
                time_axis(graph.values.len(), first.cycle_time),
                graph.values.clone(),
            )
        })
        .collect();

    let alarm = if status.is_fail() {
        Some(AlarmEvent::root(
            NOK_ALARM_CODE,
            first
                .short_description
                .clone()
                .unwrap_or_else(|| "riveting process failed".to_string()),
            first.device_name.clone(),
        ))
    } else {
        None
    };

    // The whole execution is one step: the payload has no step markers
    let step = StepRecord {
        index: 0,
        name: "Riveting".to_string(),
        outcome: status,
        key_value: first.final_force,
        target_value: None,
        start_time,
        end_time,
        curves,
        alarm,
    };

    let extension = json!({
        "final_force": first.final_force,
        "final_stroke": first.final_stroke,
        "start_distance": first.start_distance,
        "end_distance": first.end_distance,
        "velocity": first.velocity,
        "parameter_limits": Value::Object(parameter_limits),
    });

    ResultAggregate {
        family: family.clone(),
        result: ResultRecord {
            source_id: first.source_id,
            cycle_number: first.sequence_number.clone(),
            device_name: first.device_name.clone(),
            system_id: first.device_name.clone(),
            serial_number: first.serial_number.clone(),
            program_id,
            status,
            start_time,
            end_time,
            cycle_time: first.cycle_time,
            key_value: Some(first.final_force),
        },
        programs,
        primary_parameter: PRIMARY_PARAMETER.to_string(),
        steps: vec![step],
        extension,
    }
}

/// Normalize a source graph type to the curve type label.
fn curve_type_label(graph_type: &str) -> String {
    if graph_type.contains("Force") {
        "FORCE".to_string()
    } else if graph_type.contains("Stroke") {
        "STROKE".to_string()
    } else {
        graph_type.to_uppercase().replace('/', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn family() -> Family {
        Family::from_str("riveting").unwrap()
    }

    fn row(parameter_type: &str, limits: (f64, f64), description: Option<&str>) -> RivetingRow {
        RivetingRow {
            source_id: 9001,
            device_name: Some("RIV-3".into()),
            sequence_number: "77".into(),
            recorded_at: Utc.with_ymd_and_hms(2024, 5, 2, 14, 30, 0).unwrap(),
            program_ref: 5,
            program_name: Some("Door panel".into()),
            program_identifier: Some("DP-05".into()),
            program_version: Some("3".into()),
            final_force: 42.5,
            final_stroke: 11.0,
            start_distance: 2.0,
            end_distance: 9.5,
            velocity: 180.0,
            cycle_time: 1.5,
            limit_high: Some(limits.1),
            limit_low: Some(limits.0),
            parameter_type: Some(parameter_type.into()),
            short_description: description.map(String::from),
            serial_number: Some("SN-123".into()),
        }
    }

    #[test]
    fn test_multi_parameter_grouping() {
        let rows = vec![
            row("Final Force", (10.0, 20.0), Some("OK")),
            row("Final Stroke", (0.0, 5.0), Some("OK")),
        ];
        let aggregate = normalize(&family(), &rows, &[]);

        assert_eq!(aggregate.programs.len(), 2);
        assert_eq!(aggregate.programs[0].parameter_type, "Final Force");
        assert_eq!(aggregate.programs[0].target_value, Some(15.0));
        assert_eq!(aggregate.programs[1].parameter_type, "Final Stroke");
        // Zero lower bound means no target midpoint
        assert_eq!(aggregate.programs[1].target_value, None);

        // Result links to the primary parameter's program
        assert_eq!(
            aggregate.primary_program().unwrap().parameter_type,
            "Final Force"
        );

        let limits = aggregate.extension["parameter_limits"].as_object().unwrap();
        assert_eq!(limits.len(), 2);
        assert_eq!(limits["Final Force"]["limit_high"], 20.0);
        assert_eq!(limits["Final Stroke"]["limit_low"], 0.0);
    }

    #[test]
    fn test_duplicate_parameter_rows_collapse() {
        let rows = vec![
            row("Final Force", (10.0, 20.0), Some("OK")),
            row("Final Force", (11.0, 21.0), Some("OK")),
        ];
        let aggregate = normalize(&family(), &rows, &[]);

        assert_eq!(aggregate.programs.len(), 1);
        // First occurrence wins
        assert_eq!(aggregate.programs[0].lower_limit, Some(10.0));
    }

    #[test]
    fn test_fail_closed_status() {
        // Neither affirmative nor negative token: must fail
        let rows = vec![row("Final Force", (1.0, 2.0), Some("finished"))];
        let aggregate = normalize(&family(), &rows, &[]);
        assert_eq!(aggregate.result.status, TestStatus::Fail);

        let alarm = aggregate.steps[0].alarm.as_ref().unwrap();
        assert_eq!(alarm.code, NOK_ALARM_CODE);
        assert_eq!(alarm.message, "finished");
        assert_eq!(alarm.device_id.as_deref(), Some("RIV-3"));
    }

    #[test]
    fn test_nok_description_forces_fail() {
        let rows = vec![row("Final Force", (1.0, 2.0), Some("Force NOK"))];
        let aggregate = normalize(&family(), &rows, &[]);
        assert_eq!(aggregate.result.status, TestStatus::Fail);
        assert_eq!(aggregate.steps[0].outcome, TestStatus::Fail);
    }

    #[test]
    fn test_single_step_with_synthesized_time_axis() {
        let rows = vec![row("Final Force", (1.0, 2.0), Some("OK"))];
        let graphs = vec![DecodedGraph {
            graph_type: "Force curve".into(),
            values: vec![1.0, 2.0, 3.0, 4.0],
        }];

        let aggregate = normalize(&family(), &rows, &graphs);
        assert_eq!(aggregate.steps.len(), 1);
        let step = &aggregate.steps[0];
        assert_eq!(step.index, 0);
        assert_eq!(step.name, "Riveting");
        assert!(step.alarm.is_none());

        let curve = &step.curves[0];
        assert_eq!(curve.curve_type, "FORCE");
        assert_eq!(curve.x, vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(curve.y, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_curve_type_labels() {
        assert_eq!(curve_type_label("Force curve"), "FORCE");
        assert_eq!(curve_type_label("Stroke graph"), "STROKE");
        assert_eq!(curve_type_label("pressure/ram"), "PRESSURE_RAM");
    }

    #[test]
    fn test_result_fields_from_first_row() {
        let rows = vec![row("Final Force", (1.0, 2.0), Some("OK"))];
        let aggregate = normalize(&family(), &rows, &[]);

        let result = &aggregate.result;
        assert_eq!(result.source_id, 9001);
        assert_eq!(result.program_id, "DP-05");
        assert_eq!(result.key_value, Some(42.5));
        assert_eq!(result.cycle_time, 1.5);
        assert_eq!(
            (result.end_time - result.start_time).num_milliseconds(),
            1500
        );
        assert_eq!(aggregate.extension["velocity"], 180.0);
    }
}
