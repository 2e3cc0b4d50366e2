//! Occurrence state machine: the four operations that write the exception
//! ledger the materializer reads. Each operation is an upsert keyed by
//! `(schedule_id, original_at)` and snapshots the price in effect on the
//! original slot date — a moved occurrence keeps the price of the slot it
//! was booked into.

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::repository::exception as exception_repo;
use crate::db::repository::schedule as schedule_repo;
use crate::error::SchedulingError;
use crate::models::{Exception, OccurrenceStatus, Schedule};
use crate::pricing;

/// Mark an occurrence as realized. `realized_at` defaults to the slot
/// itself. Re-confirming is permitted (and re-snapshots the price), but a
/// row that is already realized keeps its `realized_at`.
pub fn confirm(
    conn: &mut Connection,
    schedule_id: &Uuid,
    original_at: NaiveDateTime,
    realized_at: Option<NaiveDateTime>,
) -> Result<Exception, SchedulingError> {
    with_occurrence(conn, schedule_id, original_at, |schedule, existing, price| {
        let realized_at = match &existing {
            Some(e) if e.status == OccurrenceStatus::Realized => e.realized_at,
            _ => Some(realized_at.unwrap_or(original_at)),
        };
        Ok(Exception {
            realized_at,
            charged_amount: price,
            status: OccurrenceStatus::Realized,
            charge_on_no_show: false,
            ..base_row(schedule, original_at, existing)
        })
    })
}

/// Move an occurrence to a new datetime, keeping the original slot as its
/// identity. The prior location, when it differs, is appended to the
/// reschedule history.
pub fn reschedule(
    conn: &mut Connection,
    schedule_id: &Uuid,
    original_at: NaiveDateTime,
    new_at: NaiveDateTime,
) -> Result<Exception, SchedulingError> {
    with_occurrence(conn, schedule_id, original_at, |schedule, existing, price| {
        reject_terminal(&existing)?;

        let mut row = base_row(schedule, original_at, existing);
        if let Some(prior) = row.realized_at {
            if prior != new_at {
                row.reschedule_history.push(prior);
            }
        }
        row.realized_at = Some(new_at);
        row.charged_amount = price;
        row.status = OccurrenceStatus::Scheduled;
        Ok(row)
    })
}

/// Record that the patient did not show up. `charge` feeds downstream
/// billing eligibility; the engine only stores it.
pub fn register_no_show(
    conn: &mut Connection,
    schedule_id: &Uuid,
    original_at: NaiveDateTime,
    charge: bool,
) -> Result<Exception, SchedulingError> {
    with_occurrence(conn, schedule_id, original_at, |schedule, existing, price| {
        reject_terminal(&existing)?;

        let mut row = base_row(schedule, original_at, existing);
        row.realized_at = None;
        row.charged_amount = price;
        row.status = OccurrenceStatus::NoShow;
        row.charge_on_no_show = charge;
        Ok(row)
    })
}

/// Cancel an occurrence, freeing its slot for one-off bookings. The price
/// snapshot is retained for audit even though nothing is billed.
pub fn cancel(
    conn: &mut Connection,
    schedule_id: &Uuid,
    original_at: NaiveDateTime,
) -> Result<Exception, SchedulingError> {
    with_occurrence(conn, schedule_id, original_at, |schedule, existing, price| {
        reject_terminal(&existing)?;

        let mut row = base_row(schedule, original_at, existing);
        row.realized_at = None;
        row.charged_amount = price;
        row.status = OccurrenceStatus::Cancelled;
        row.charge_on_no_show = false;
        Ok(row)
    })
}

/// Shared upsert plumbing: load the schedule, snapshot the price at the
/// original slot date, hand the existing ledger row (if any) to `build`,
/// and write the result — all inside one immediate transaction so two
/// concurrent transitions on the same occurrence serialize.
fn with_occurrence<F>(
    conn: &mut Connection,
    schedule_id: &Uuid,
    original_at: NaiveDateTime,
    build: F,
) -> Result<Exception, SchedulingError>
where
    F: FnOnce(&Schedule, Option<Exception>, f64) -> Result<Exception, SchedulingError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let schedule = schedule_repo::get_schedule(&tx, schedule_id)?
        .ok_or(SchedulingError::ScheduleNotFound { id: *schedule_id })?;
    let price = pricing::session_price(&tx, &schedule, original_at.date())?;
    let existing = exception_repo::find_by_slot(&tx, schedule_id, original_at)?;

    let row = build(&schedule, existing, price)?;
    exception_repo::upsert_exception(&tx, &row)?;
    let written = exception_repo::find_by_slot(&tx, schedule_id, original_at)?.ok_or_else(|| {
        SchedulingError::Database(crate::db::DatabaseError::ConstraintViolation(
            "upserted exception row disappeared".into(),
        ))
    })?;

    tx.commit()?;
    tracing::debug!(
        schedule_id = %schedule_id,
        original_at = %original_at,
        status = written.status.as_str(),
        "Occurrence transition"
    );
    Ok(written)
}

/// Start from the existing row when present (preserving history, notes and
/// the charge flag), else a fresh one.
fn base_row(schedule: &Schedule, original_at: NaiveDateTime, existing: Option<Exception>) -> Exception {
    existing.unwrap_or_else(|| Exception {
        id: Uuid::new_v4(),
        schedule_id: schedule.id,
        scheduled_at: original_at,
        realized_at: None,
        charged_amount: 0.0,
        status: OccurrenceStatus::Scheduled,
        charge_on_no_show: false,
        reschedule_history: Vec::new(),
        notes: None,
    })
}

fn reject_terminal(existing: &Option<Exception>) -> Result<(), SchedulingError> {
    match existing {
        Some(e) if e.status.is_terminal() => {
            Err(SchedulingError::InvalidTransition { status: e.status })
        }
        _ => Ok(()),
    }
}
