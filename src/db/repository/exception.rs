use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Exception, OccurrenceStatus};

const EXCEPTION_COLUMNS: &str = "id, schedule_id, scheduled_at, realized_at, charged_amount, \
     status, charge_on_no_show, reschedule_history, notes";

/// Insert-or-update by the natural key `(schedule_id, scheduled_at)`.
/// The conflict clause is what serializes two concurrent state-transition
/// calls on the same occurrence: whichever lands second updates in place
/// instead of failing or duplicating.
pub fn upsert_exception(conn: &Connection, exception: &Exception) -> Result<(), DatabaseError> {
    let history = serde_json::to_string(
        &exception
            .reschedule_history
            .iter()
            .copied()
            .map(fmt_datetime)
            .collect::<Vec<_>>(),
    )
    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    conn.execute(
        "INSERT INTO exceptions (id, schedule_id, scheduled_at, realized_at, charged_amount,
         status, charge_on_no_show, reschedule_history, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (schedule_id, scheduled_at) DO UPDATE SET
             realized_at = excluded.realized_at,
             charged_amount = excluded.charged_amount,
             status = excluded.status,
             charge_on_no_show = excluded.charge_on_no_show,
             reschedule_history = excluded.reschedule_history,
             notes = COALESCE(excluded.notes, notes)",
        params![
            exception.id.to_string(),
            exception.schedule_id.to_string(),
            fmt_datetime(exception.scheduled_at),
            exception.realized_at.map(fmt_datetime),
            exception.charged_amount,
            exception.status.as_str(),
            exception.charge_on_no_show as i32,
            history,
            exception.notes,
        ],
    )?;
    Ok(())
}

/// The ledger row for one specific occurrence, if any.
pub fn find_by_slot(
    conn: &Connection,
    schedule_id: &Uuid,
    scheduled_at: NaiveDateTime,
) -> Result<Option<Exception>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXCEPTION_COLUMNS} FROM exceptions
         WHERE schedule_id = ?1 AND scheduled_at = ?2"
    ))?;

    let result = stmt.query_row(
        params![schedule_id.to_string(), fmt_datetime(scheduled_at)],
        |row| Ok(exception_row_from_rusqlite(row)),
    );

    match result {
        Ok(row) => Ok(Some(exception_from_row(row?)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All exceptions whose scheduled or realized time falls inside the
/// inclusive wall-clock range. Malformed rows are logged and skipped.
pub fn list_in_range(
    conn: &Connection,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
) -> Result<Vec<Exception>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXCEPTION_COLUMNS} FROM exceptions
         WHERE (scheduled_at >= ?1 AND scheduled_at <= ?2)
            OR (realized_at >= ?1 AND realized_at <= ?2)
         ORDER BY scheduled_at"
    ))?;

    let rows = stmt.query_map(
        params![fmt_datetime(start_at), fmt_datetime(end_at)],
        |row| Ok(exception_row_from_rusqlite(row)),
    )?;

    let mut exceptions = Vec::new();
    for row in rows {
        match exception_from_row(row??) {
            Ok(exception) => exceptions.push(exception),
            Err(e) => tracing::warn!("Skipping malformed exception row: {e}"),
        }
    }
    Ok(exceptions)
}

// Internal row type for Exception mapping
struct ExceptionRow {
    id: String,
    schedule_id: String,
    scheduled_at: String,
    realized_at: Option<String>,
    charged_amount: f64,
    status: String,
    charge_on_no_show: i32,
    reschedule_history: String,
    notes: Option<String>,
}

fn exception_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ExceptionRow, rusqlite::Error> {
    Ok(ExceptionRow {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        scheduled_at: row.get(2)?,
        realized_at: row.get(3)?,
        charged_amount: row.get(4)?,
        status: row.get(5)?,
        charge_on_no_show: row.get(6)?,
        reschedule_history: row.get(7)?,
        notes: row.get(8)?,
    })
}

fn exception_from_row(row: ExceptionRow) -> Result<Exception, DatabaseError> {
    let history: Vec<String> = serde_json::from_str(&row.reschedule_history)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad reschedule history: {e}")))?;
    let reschedule_history = history
        .iter()
        .map(|s| parse_datetime(s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Exception {
        id: parse_uuid(&row.id)?,
        schedule_id: parse_uuid(&row.schedule_id)?,
        scheduled_at: parse_datetime(&row.scheduled_at)?,
        realized_at: row.realized_at.as_deref().map(parse_datetime).transpose()?,
        charged_amount: row.charged_amount,
        status: OccurrenceStatus::from_str(&row.status)?,
        charge_on_no_show: row.charge_on_no_show != 0,
        reschedule_history,
        notes: row.notes,
    })
}
