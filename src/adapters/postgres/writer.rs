//! Idempotent aggregate writer
//!
//! Persists one [`ResultAggregate`] into the normalized biz schema. All
//! writes for one aggregate happen on the caller's transaction: any failure
//! rolls back the whole result with its steps, curves, alarms and extension,
//! leaving no partial rows.
//!
//! Idempotency is two-layered: the existence check on (source_id, craft)
//! short-circuits re-runs, and the schema's unique constraint stops the rare
//! race where two workers see the same unmigrated record.

use crate::domain::aggregate::{Program, ResultAggregate, StepRecord};
use crate::domain::ids::Family;
use crate::domain::{AnvilError, Result};
use tokio_postgres::Transaction;

fn tx_err(e: tokio_postgres::Error) -> AnvilError {
    AnvilError::Transaction(e.to_string())
}

/// Check whether a result for (source_id, family) already exists.
pub async fn already_migrated(
    tx: &Transaction<'_>,
    source_id: i64,
    family: &Family,
) -> Result<bool> {
    let row = tx
        .query_opt(
            "SELECT id FROM biz.result WHERE source_id = $1 AND craft_type = $2",
            &[&source_id, &family.craft_label()],
        )
        .await
        .map_err(tx_err)?;
    Ok(row.is_some())
}

/// Persist a full aggregate, returning the generated result id.
///
/// Programs are upserted first (insert-if-absent, first writer wins), the
/// result row links to the primary program's surrogate id, then steps,
/// curves, alarms and the extension are written in order.
pub async fn persist(tx: &Transaction<'_>, aggregate: &ResultAggregate) -> Result<i64> {
    let craft = aggregate.family.craft_label();

    // Programs: insert-if-absent, resolving existing surrogate ids
    let mut primary_program_id: Option<i64> = None;
    let mut first_program_id: Option<i64> = None;
    for program in &aggregate.programs {
        let id = upsert_program(tx, program, &craft).await?;
        if first_program_id.is_none() {
            first_program_id = Some(id);
        }
        if program.parameter_type == aggregate.primary_parameter {
            primary_program_id = Some(id);
        }
    }
    let program_fk = primary_program_id.or(first_program_id);

    // Result
    let result = &aggregate.result;
    let result_id: i64 = tx
        .query_one(
            "INSERT INTO biz.result (
                source_id, cyclenumber, device_name, system_id, bsn, vin,
                program_id, program_ver_id, result_status,
                start_time, end_time, cycle_time, key_value, craft_type
             ) VALUES (
                $1, $2, $3, $4, $5, NULL,
                $6, $7, $8,
                $9, $10, $11, $12, $13
             )
             RETURNING id",
            &[
                &result.source_id,
                &result.cycle_number,
                &result.device_name,
                &result.system_id,
                &result.serial_number,
                &result.program_id,
                &program_fk,
                &result.status.as_code(),
                &result.start_time,
                &result.end_time,
                &result.cycle_time,
                &result.key_value,
                &craft,
            ],
        )
        .await
        .map_err(tx_err)?
        .get(0);

    // Extension
    tx.execute(
        "INSERT INTO biz.extension (result_id, extra_data, operator_id, fixture_id)
         VALUES ($1, $2, NULL, NULL)",
        &[&result_id, &aggregate.extension],
    )
    .await
    .map_err(tx_err)?;

    // Steps with their curves and alarms
    for step in &aggregate.steps {
        persist_step(tx, result_id, step).await?;
    }

    Ok(result_id)
}

/// Insert a program if absent, else resolve the existing surrogate id.
async fn upsert_program(tx: &Transaction<'_>, program: &Program, craft: &str) -> Result<i64> {
    let inserted = tx
        .query_opt(
            "INSERT INTO biz.program (
                program_id, version, program_name, device_type, craft_type,
                parameter_type, target_value, upper_limit, lower_limit
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (program_id, version, parameter_type) DO NOTHING
             RETURNING id",
            &[
                &program.program_id,
                &program.version,
                &program.name,
                &program.device_type,
                &craft,
                &program.parameter_type,
                &program.target_value,
                &program.upper_limit,
                &program.lower_limit,
            ],
        )
        .await
        .map_err(tx_err)?;

    if let Some(row) = inserted {
        return Ok(row.get(0));
    }

    // Another writer got here first; the row is immutable, just resolve it
    let row = tx
        .query_one(
            "SELECT id FROM biz.program
             WHERE program_id = $1 AND version = $2 AND parameter_type = $3",
            &[&program.program_id, &program.version, &program.parameter_type],
        )
        .await
        .map_err(tx_err)?;
    Ok(row.get(0))
}

async fn persist_step(tx: &Transaction<'_>, result_id: i64, step: &StepRecord) -> Result<()> {
    for curve in &step.curves {
        tx.execute(
            "INSERT INTO biz.curve (result_id, step, start_time, end_time, curve_type, data_points)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &result_id,
                &step.index,
                &step.start_time,
                &step.end_time,
                &curve.curve_type,
                &curve.data_points(),
            ],
        )
        .await
        .map_err(tx_err)?;
    }

    let step_id: i64 = tx
        .query_one(
            "INSERT INTO biz.step (
                result_id, step_index, step_name, step_result,
                step_value, target_value, start_time, end_time
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
            &[
                &result_id,
                &step.index,
                &step.name,
                &step.outcome.as_code(),
                &step.key_value,
                &step.target_value,
                &step.start_time,
                &step.end_time,
            ],
        )
        .await
        .map_err(tx_err)?
        .get(0);

    if let Some(alarm) = &step.alarm {
        tx.execute(
            "INSERT INTO biz.alarm (
                result_id, step_id, alarm_code, alarm_level, alarm_msg,
                device_id, parent_alarm_id
             ) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &result_id,
                &step_id,
                &alarm.code,
                &alarm.level,
                &alarm.message,
                &alarm.device_id,
                &alarm.parent_alarm_id,
            ],
        )
        .await
        .map_err(tx_err)?;
    }

    Ok(())
}
