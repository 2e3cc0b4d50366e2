//! Calendar materialization: expands active schedules plus the exception
//! ledger into a concrete, ordered list of events for a date range. A pure
//! read — every call recomputes from scratch and the produced events carry
//! no identity across calls.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::CalendarConfig;
use crate::db::repository::{
    exception as exception_repo, patient as patient_repo, schedule as schedule_repo,
};
use crate::error::SchedulingError;
use crate::models::{
    CalendarEvent, EventKind, EventStatus, Exception, OccurrenceStatus, ScheduleWithPatient,
};

/// Label used when the patient directory cannot resolve a reference; a
/// dangling patient must not abort materialization.
const UNKNOWN_PATIENT: &str = "(unknown patient)";

/// Expand all active schedules and in-range ledger rows into calendar
/// events for the inclusive date range `[start, end]`.
///
/// Per schedule: walk the candidate dates, apply the recurrence predicate,
/// and emit either an `available` virtual slot or the projection of the
/// ledger row claiming that slot (including rescheduled-origin ghosts for
/// moved occurrences). Ledger rows in range that no generated slot claimed
/// — the schedule was deactivated, its frequency changed, or the row is
/// orphaned — are emitted directly so history is never silently dropped.
pub fn generate_calendar(
    conn: &Connection,
    config: &CalendarConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<CalendarEvent>, SchedulingError> {
    let schedules = schedule_repo::list_active_with_patients(conn)?;
    let range_start = start.and_hms_opt(0, 0, 0).unwrap_or_default();
    let range_end = end.and_hms_opt(23, 59, 59).unwrap_or_default();
    let exceptions = exception_repo::list_in_range(conn, range_start, range_end)?;

    let by_slot: HashMap<(Uuid, NaiveDateTime), &Exception> = exceptions
        .iter()
        .map(|e| ((e.schedule_id, e.scheduled_at), e))
        .collect();

    let mut events = Vec::new();
    let mut matched: HashSet<Uuid> = HashSet::new();

    for entry in &schedules {
        expand_schedule(config, entry, start, end, &by_slot, &mut matched, &mut events);
    }

    // Sweep: ledger rows nothing above claimed.
    for exception in &exceptions {
        if matched.contains(&exception.id) {
            continue;
        }
        match stray_event(conn, config, exception) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(
                exception_id = %exception.id,
                "Skipping unmatched exception without schedule: {e}"
            ),
        }
    }

    events.sort_by(|a, b| {
        a.display_at
            .cmp(&b.display_at)
            .then_with(|| display_priority(a).cmp(&display_priority(b)))
    });
    Ok(events)
}

fn expand_schedule(
    config: &CalendarConfig,
    entry: &ScheduleWithPatient,
    start: NaiveDate,
    end: NaiveDate,
    by_slot: &HashMap<(Uuid, NaiveDateTime), &Exception>,
    matched: &mut HashSet<Uuid>,
    events: &mut Vec<CalendarEvent>,
) {
    let schedule = &entry.schedule;

    // The whole lifetime precedes the window: nothing to generate.
    if matches!(schedule.end_date, Some(schedule_end) if schedule_end < start) {
        return;
    }

    let rule = schedule.recurrence();
    let walk_start = start.max(schedule.start_date);
    let walk_end = schedule.end_date.map_or(end, |schedule_end| end.min(schedule_end));

    let mut date = walk_start;
    while date <= walk_end {
        if rule.matches(date) {
            let slot = date.and_time(schedule.time_of_day);
            match by_slot.get(&(schedule.id, slot)) {
                None => events.push(CalendarEvent {
                    display_at: config.localize(slot),
                    original_at: config.localize(slot),
                    moved_to: None,
                    kind: EventKind::VirtualSlot,
                    status: EventStatus::Available,
                    schedule_id: schedule.id,
                    exception_id: None,
                    patient_id: schedule.patient_id,
                    patient_name: patient_label(entry.patient_name.as_deref()),
                    patient_email: entry.patient_email.clone(),
                    freeable: false,
                }),
                Some(exception) => {
                    matched.insert(exception.id);
                    project_exception(config, entry, exception, events);
                }
            }
        }
        match date.checked_add_days(Days::new(1)) {
            Some(next) => date = next,
            None => break,
        }
    }
}

/// Project one claimed slot into events. A moved occurrence becomes a ghost
/// at its original slot, one ghost per intermediate location, and the real
/// event at its current location; anything else is a single event.
fn project_exception(
    config: &CalendarConfig,
    entry: &ScheduleWithPatient,
    exception: &Exception,
    events: &mut Vec<CalendarEvent>,
) {
    let schedule = &entry.schedule;
    let base = CalendarEvent {
        display_at: config.localize(exception.scheduled_at),
        original_at: config.localize(exception.scheduled_at),
        moved_to: None,
        kind: EventKind::Occurrence,
        status: exception.status.into(),
        schedule_id: schedule.id,
        exception_id: Some(exception.id),
        patient_id: schedule.patient_id,
        patient_name: patient_label(entry.patient_name.as_deref()),
        patient_email: entry.patient_email.clone(),
        freeable: false,
    };

    if exception.moved() {
        let moved_to: Option<DateTime<FixedOffset>> =
            exception.realized_at.map(|at| config.localize(at));

        // Ghost at the original slot, pointing at the new location.
        events.push(CalendarEvent {
            status: EventStatus::RescheduledOrigin,
            moved_to,
            freeable: true,
            ..base.clone()
        });

        // One ghost per intermediate move, each pointing at the same final
        // location.
        for &hop in &exception.reschedule_history {
            events.push(CalendarEvent {
                display_at: config.localize(hop),
                status: EventStatus::RescheduledOrigin,
                moved_to,
                ..base.clone()
            });
        }

        // The occurrence where it actually is now.
        events.push(CalendarEvent {
            display_at: config.localize(exception.effective_at()),
            ..base
        });
    } else {
        let freeable = exception.status == OccurrenceStatus::Cancelled;
        events.push(CalendarEvent {
            display_at: config.localize(exception.effective_at()),
            freeable,
            ..base
        });
    }
}

/// An in-range ledger row whose slot no active schedule generated. The
/// schedule row still exists (rows are never hard-deleted), so patient data
/// comes from a direct lookup.
fn stray_event(
    conn: &Connection,
    config: &CalendarConfig,
    exception: &Exception,
) -> Result<CalendarEvent, SchedulingError> {
    let schedule = schedule_repo::get_schedule(conn, &exception.schedule_id)?.ok_or(
        SchedulingError::ScheduleNotFound {
            id: exception.schedule_id,
        },
    )?;
    let patient = patient_repo::get_patient(conn, &schedule.patient_id)?;

    Ok(CalendarEvent {
        display_at: config.localize(exception.effective_at()),
        original_at: config.localize(exception.scheduled_at),
        moved_to: None,
        kind: EventKind::Occurrence,
        status: exception.status.into(),
        schedule_id: schedule.id,
        exception_id: Some(exception.id),
        patient_id: schedule.patient_id,
        patient_name: patient_label(patient.as_ref().map(|p| p.full_name.as_str())),
        patient_email: patient.and_then(|p| p.email),
        freeable: false,
    })
}

fn patient_label(name: Option<&str>) -> String {
    name.unwrap_or(UNKNOWN_PATIENT).to_string()
}

/// Ranking for events sharing a visual bucket: virtual slots yield to
/// rescheduled-origin ghosts, which yield to everything else.
pub fn display_priority(event: &CalendarEvent) -> u8 {
    match (event.kind, event.status) {
        (EventKind::VirtualSlot, _) => 0,
        (_, EventStatus::RescheduledOrigin) => 1,
        _ => 2,
    }
}

/// The one event to draw per (day, half-hour) bucket: the highest-priority
/// event wins; lower-priority events stay queryable but are visually
/// subordinate.
pub fn visible_events(events: &[CalendarEvent]) -> Vec<&CalendarEvent> {
    let mut best: HashMap<(NaiveDate, u32), &CalendarEvent> = HashMap::new();
    for event in events {
        let local = event.display_at.naive_local();
        let bucket = (local.date(), local.hour() * 2 + local.minute() / 30);
        best.entry(bucket)
            .and_modify(|current| {
                if display_priority(event) > display_priority(current) {
                    *current = event;
                }
            })
            .or_insert(event);
    }
    let mut visible: Vec<&CalendarEvent> = best.into_values().collect();
    visible.sort_by_key(|e| e.display_at);
    visible
}
