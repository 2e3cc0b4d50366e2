//! Conflict detection: prevents two active schedules from claiming the same
//! weekday/time slot. Shares the recurrence predicate with the materializer
//! and consults the exception ledger for the one case where a claimed slot
//! can be free (a cancelled or moved-away occurrence of a recurring
//! schedule).

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{exception as exception_repo, schedule as schedule_repo};
use crate::error::SchedulingError;
use crate::models::{Exception, Frequency, OccurrenceStatus, Schedule};
use crate::recurrence::Recurrence;

/// The slot claim being validated before a schedule insert or update.
#[derive(Debug, Clone)]
pub struct ConflictCheck {
    pub weekday: u8,
    pub time_of_day: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub frequency: Frequency,
    /// The schedule under edit, excluded from the candidate set.
    pub exclude_id: Option<Uuid>,
}

/// Validate a slot claim against all active schedules on the same
/// weekday/time. Returns `Ok(())` or `ScheduleConflict` naming the patient
/// whose schedule collides. All-or-nothing: detection writes nothing.
pub fn check_conflict(conn: &Connection, check: &ConflictCheck) -> Result<(), SchedulingError> {
    let candidates = schedule_repo::list_slot_candidates(
        conn,
        check.weekday,
        check.time_of_day,
        check.exclude_id.as_ref(),
    )?;

    for existing in &candidates {
        if !ranges_overlap(
            check.start_date,
            check.end_date,
            existing.start_date,
            existing.end_date,
        ) {
            continue;
        }

        if pair_conflicts(conn, check, existing)? {
            return Err(SchedulingError::ScheduleConflict {
                patient_id: existing.patient_id,
            });
        }
    }

    Ok(())
}

/// Date-range overlap precondition: no conflict is possible when one range
/// ends strictly before the other begins. Open ends never end.
fn ranges_overlap(
    a_start: NaiveDate,
    a_end: Option<NaiveDate>,
    b_start: NaiveDate,
    b_end: Option<NaiveDate>,
) -> bool {
    if matches!(a_end, Some(end) if end < b_start) {
        return false;
    }
    if matches!(b_end, Some(end) if end < a_start) {
        return false;
    }
    true
}

/// Resolve one candidate pair by frequency.
fn pair_conflicts(
    conn: &Connection,
    check: &ConflictCheck,
    existing: &Schedule,
) -> Result<bool, SchedulingError> {
    use Frequency::*;

    Ok(match (check.frequency, existing.frequency) {
        (Once, Once) => check.start_date == existing.start_date,

        // A one-off landing on a generated occurrence of a recurring
        // schedule (weekly included) conflicts unless that specific
        // occurrence was freed.
        (Once, _) => {
            single_lands_on(check.start_date, existing)
                && !slot_is_freed(conn, &existing.id, existing, check.start_date)?
        }
        (_, Once) => {
            let candidate_rule =
                Recurrence::from_parts(check.frequency, check.weekday, check.start_date);
            let lands = existing.start_date >= check.start_date
                && check
                    .end_date
                    .map_or(true, |end| existing.start_date <= end)
                && candidate_rule.matches(existing.start_date);
            if !lands {
                false
            } else if let Some(recurring_id) = check.exclude_id {
                // Updating an existing recurring schedule: its own ledger
                // may have freed the slot the one-off sits on.
                !slot_is_freed(conn, &recurring_id, existing, existing.start_date)?
            } else {
                // Brand-new recurring schedule: no ledger rows exist yet,
                // so the occurrence necessarily collides.
                true
            }
        }

        // Weekly claims every instance of the weekday/time for its whole
        // lifetime; no other recurrence fits next to it.
        (Weekly, _) | (_, Weekly) => true,

        (Biweekly, Biweekly) => {
            (check.start_date - existing.start_date).num_days().abs() % 14 == 0
        }

        (Monthly, Monthly) => {
            use chrono::Datelike;
            check.start_date.day() == existing.start_date.day()
        }

        // Biweekly against monthly: eventual alignment is assumed possible,
        // so reject conservatively.
        (Biweekly, Monthly) | (Monthly, Biweekly) => true,
    })
}

/// Whether a single date falls on a generated occurrence of `recurring`,
/// inside its lifetime.
fn single_lands_on(single: NaiveDate, recurring: &Schedule) -> bool {
    if single < recurring.start_date {
        return false;
    }
    if matches!(recurring.end_date, Some(end) if single > end) {
        return false;
    }
    recurring.recurrence().matches(single)
}

/// A recurring schedule's occurrence is freed when its ledger row at that
/// slot is cancelled or was moved to a different datetime.
fn slot_is_freed(
    conn: &Connection,
    recurring_id: &Uuid,
    slot_owner: &Schedule,
    date: NaiveDate,
) -> Result<bool, SchedulingError> {
    let slot = date.and_time(slot_owner.time_of_day);
    let exception = exception_repo::find_by_slot(conn, recurring_id, slot)?;
    Ok(exception.as_ref().is_some_and(occurrence_freed))
}

fn occurrence_freed(exception: &Exception) -> bool {
    exception.status == OccurrenceStatus::Cancelled || exception.moved()
}
