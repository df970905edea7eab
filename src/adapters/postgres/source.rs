//! Source store queries
//!
//! Read-only access to the legacy origin schema. Batch enumeration runs on a
//! plain pooled connection; per-record fetches run inside the item's
//! transaction so enumeration, reads and writes see one snapshot.
//!
//! All value columns are cast in SQL to stable wire types (float8/int/text)
//! because the legacy tables are inconsistent about numeric widths.

use crate::core::decode::RawCurve;
use crate::domain::errors::SourceError;
use crate::domain::Result;
use chrono::{DateTime, Utc};
use tokio_postgres::{GenericClient, Row};

/// One fastening execution row from the legacy curve view.
#[derive(Debug, Clone)]
pub struct FasteningRow {
    /// Monotonic source offset (autoindex)
    pub offset: i64,
    /// Numeric reference into the legacy program table
    pub program_ref: i64,
    /// Controller/system identifier
    pub system_id: Option<String>,
    /// Start selector recorded by the controller
    pub start_selection: Option<String>,
    /// Legacy ok/nok status code
    pub ok_nok_code: i32,
    /// Last executed program step
    pub last_step: Option<i32>,
    /// Execution start
    pub start_time: DateTime<Utc>,
    /// Production cycle number
    pub cycle_number: String,
    /// Execution duration in seconds
    pub duration: f64,
    /// Workpiece serial number
    pub serial_number: Option<String>,
    /// Program selector recorded by the controller
    pub program_selection: Option<String>,
    /// Opaque curve payload
    pub curve: Option<RawCurve>,
}

/// Program metadata from the legacy fastening program table.
#[derive(Debug, Clone)]
pub struct FasteningProgramRow {
    /// Program display name
    pub name: Option<String>,
    /// Last-change timestamp, the basis for the version label
    pub last_changed: Option<DateTime<Utc>>,
    /// Program start string; the external program code
    pub start_string: Option<String>,
}

/// One scalar KPI from the legacy single-result table.
#[derive(Debug, Clone)]
pub struct KpiRow {
    /// Measurement type label
    pub kind: String,
    /// Step the KPI belongs to
    pub step: i32,
    /// Measured value
    pub value: f64,
    /// Position within the step's result list
    pub result_index: i32,
}

/// One riveting detail row; a logical record spans one row per parameter type.
#[derive(Debug, Clone)]
pub struct RivetingRow {
    /// Shared natural id of the logical record
    pub source_id: i64,
    /// Device that produced the record
    pub device_name: Option<String>,
    /// Result sequence number
    pub sequence_number: String,
    /// Time the result was recorded
    pub recorded_at: DateTime<Utc>,
    /// Numeric legacy program id
    pub program_ref: i64,
    /// Program display name
    pub program_name: Option<String>,
    /// External program identifier
    pub program_identifier: Option<String>,
    /// Program version label
    pub program_version: Option<String>,
    /// Final riveting force
    pub final_force: f64,
    /// Final stroke
    pub final_stroke: f64,
    /// Stroke start distance
    pub start_distance: f64,
    /// Stroke end distance
    pub end_distance: f64,
    /// Riveting velocity
    pub velocity: f64,
    /// Execution duration in seconds
    pub cycle_time: f64,
    /// Upper limit for this row's parameter
    pub limit_high: Option<f64>,
    /// Lower limit for this row's parameter
    pub limit_low: Option<f64>,
    /// Measured parameter this row describes
    pub parameter_type: Option<String>,
    /// Free-text result description (the pass/fail signal)
    pub short_description: Option<String>,
    /// Workpiece serial number
    pub serial_number: Option<String>,
}

/// One compressed graph payload attached to a riveting record.
#[derive(Debug, Clone)]
pub struct GraphRow {
    /// Source graph type label
    pub graph_type: String,
    /// Compressed float-array payload
    pub payload: Option<Vec<u8>>,
}

fn fetch_err(e: tokio_postgres::Error) -> SourceError {
    SourceError::Fetch(e.to_string())
}

/// Enumerate the next fastening batch: offsets strictly greater than
/// `after`, in ascending order.
pub async fn fastening_batch_keys<C: GenericClient>(
    client: &C,
    after: i64,
    limit: i64,
) -> Result<Vec<i64>> {
    let rows = client
        .query(
            "SELECT autoindex::int8
             FROM origin.bs_fds_v_fds_curves
             WHERE autoindex > $1
             ORDER BY autoindex
             LIMIT $2",
            &[&after, &limit],
        )
        .await
        .map_err(fetch_err)?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Fetch one fastening execution row by offset.
pub async fn fetch_fastening_record<C: GenericClient>(
    client: &C,
    offset: i64,
) -> Result<Option<FasteningRow>> {
    let row = client
        .query_opt(
            "SELECT autoindex::int8, COALESCE(actualprogramid, 0)::int8, systemid::text,
                    startselection::text, COALESCE(ok_nok_code, 0)::int4, lastexecutedstep::int4,
                    starttime::timestamptz, cyclenumber::text,
                    COALESCE(duration, 0)::float8, bsn::text, progselection::text, curve
             FROM origin.bs_fds_v_fds_curves
             WHERE autoindex = $1",
            &[&offset],
        )
        .await
        .map_err(fetch_err)?;

    let Some(row) = row else {
        return Ok(None);
    };
    let start_time = row
        .try_get(6)
        .map_err(|e| SourceError::InvalidRow(format!("starttime: {e}")))?;

    Ok(Some(FasteningRow {
        offset: row.get(0),
        program_ref: row.get(1),
        system_id: trimmed(&row, 2),
        start_selection: trimmed(&row, 3),
        ok_nok_code: row.get(4),
        last_step: row.get(5),
        start_time,
        cycle_number: row.get::<_, Option<String>>(7).unwrap_or_default(),
        duration: row.get(8),
        serial_number: trimmed(&row, 9),
        program_selection: trimmed(&row, 10),
        curve: read_curve(&row, 11),
    }))
}

/// Fetch program metadata for a fastening execution.
pub async fn fetch_fastening_program<C: GenericClient>(
    client: &C,
    program_ref: i64,
) -> Result<Option<FasteningProgramRow>> {
    let row = client
        .query_opt(
            "SELECT name::text, lastchangedatetime::timestamptz, startstring::text
             FROM origin.bs_fds_progtable
             WHERE autoprogindex = $1",
            &[&program_ref],
        )
        .await
        .map_err(fetch_err)?;

    Ok(row.map(|row| FasteningProgramRow {
        name: trimmed(&row, 0),
        last_changed: row.get(1),
        start_string: trimmed(&row, 2),
    }))
}

/// Fetch the scalar KPIs attached to a fastening execution, ordered by step
/// and result index.
pub async fn fetch_fastening_kpis<C: GenericClient>(
    client: &C,
    result_list_id: i64,
) -> Result<Vec<KpiRow>> {
    let rows = client
        .query(
            "SELECT type::text, step::int4, COALESCE(value, 0)::float8, resultindex::int4
             FROM origin.bs_fds_singleresult
             WHERE resultlistid = $1
             ORDER BY step, resultindex",
            &[&result_list_id],
        )
        .await
        .map_err(fetch_err)?;

    Ok(rows
        .iter()
        .map(|row| KpiRow {
            kind: row.get::<_, Option<String>>(0).unwrap_or_default(),
            step: row.get(1),
            value: row.get(2),
            result_index: row.get(3),
        })
        .collect())
}

/// Enumerate the next riveting batch of distinct logical record ids.
pub async fn riveting_batch_keys<C: GenericClient>(
    client: &C,
    after: i64,
    limit: i64,
) -> Result<Vec<i64>> {
    let rows = client
        .query(
            "SELECT DISTINCT id::int8
             FROM origin.bs_spr_detail_v2
             WHERE id > $1
             ORDER BY id
             LIMIT $2",
            &[&after, &limit],
        )
        .await
        .map_err(fetch_err)?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Fetch every parameter row of one logical riveting record.
pub async fn fetch_riveting_rows<C: GenericClient>(
    client: &C,
    source_id: i64,
) -> Result<Vec<RivetingRow>> {
    let rows = client
        .query(
            "SELECT DISTINCT id::int8, device_name::text, result_sequence_number::text,
                    result_date_time::timestamptz, COALESCE(program_id, 0)::int8, p_name::text,
                    program_identifier::text, program_version::text,
                    COALESCE(final_force, 0)::float8, COALESCE(final_stroke, 0)::float8,
                    COALESCE(start_distance, 0)::float8, COALESCE(end_distance, 0)::float8,
                    COALESCE(velocity, 0)::float8, COALESCE(cycle_time, 0)::float8,
                    limit_high::float8, limit_low::float8, parameter_type::text,
                    short_description::text, bsn::text
             FROM origin.bs_spr_detail_v2
             WHERE id = $1",
            &[&source_id],
        )
        .await
        .map_err(fetch_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let recorded_at = row
            .try_get(3)
            .map_err(|e| SourceError::InvalidRow(format!("result_date_time: {e}")))?;
        out.push(RivetingRow {
            source_id: row.get(0),
            device_name: trimmed(row, 1),
            sequence_number: row.get::<_, Option<String>>(2).unwrap_or_default(),
            recorded_at,
            program_ref: row.get(4),
            program_name: trimmed(row, 5),
            program_identifier: trimmed(row, 6),
            program_version: trimmed(row, 7),
            final_force: row.get(8),
            final_stroke: row.get(9),
            start_distance: row.get(10),
            end_distance: row.get(11),
            velocity: row.get(12),
            cycle_time: row.get(13),
            limit_high: row.get(14),
            limit_low: row.get(15),
            parameter_type: trimmed(row, 16),
            short_description: row.get(17),
            serial_number: trimmed(row, 18),
        });
    }
    Ok(out)
}

/// Fetch the compressed graphs attached to one riveting record.
pub async fn fetch_riveting_graphs<C: GenericClient>(
    client: &C,
    source_id: i64,
) -> Result<Vec<GraphRow>> {
    let rows = client
        .query(
            "SELECT graph_type::text, graph_values
             FROM origin.bs_spr_graph_v2
             WHERE id = $1",
            &[&source_id],
        )
        .await
        .map_err(fetch_err)?;

    Ok(rows
        .iter()
        .map(|row| GraphRow {
            graph_type: row.get::<_, Option<String>>(0).unwrap_or_default(),
            payload: row.get(1),
        })
        .collect())
}

/// Read a text column, trimming whitespace and mapping empty to None.
fn trimmed(row: &Row, idx: usize) -> Option<String> {
    row.get::<_, Option<String>>(idx).and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Read the curve column, accepting raw bytes or the legacy text wrapper.
fn read_curve(row: &Row, idx: usize) -> Option<RawCurve> {
    if let Ok(bytes) = row.try_get::<_, Option<Vec<u8>>>(idx) {
        return bytes.map(RawCurve::Bytes);
    }
    row.try_get::<_, Option<String>>(idx)
        .ok()
        .flatten()
        .map(RawCurve::Text)
}
