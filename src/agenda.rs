//! Schedule store: validated CRUD over recurrence definitions. Every write
//! that can introduce a slot claim runs the conflict detector and commits
//! in one transaction, so two concurrent creates cannot both pass the check
//! and land.

use chrono::{Days, Local, NaiveDate, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::conflict::{self, ConflictCheck};
use crate::db::repository::schedule as schedule_repo;
use crate::error::SchedulingError;
use crate::models::{Frequency, Schedule, ScheduleWithPatient, UpdateMode};
use crate::recurrence::weekday_index;

/// Fields accepted when creating a schedule. `weekday` is optional and
/// derived from `start_date` when absent.
#[derive(Debug, Clone)]
pub struct CreateScheduleInput {
    pub patient_id: Uuid,
    pub frequency: Frequency,
    pub weekday: Option<u8>,
    pub time_of_day: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub fixed_price: Option<f64>,
    pub price_category_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Partial update. The double `Option` on `end_date` distinguishes "leave
/// unchanged" (`None`) from "clear, making the schedule open-ended"
/// (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct UpdateScheduleInput {
    pub patient_id: Option<Uuid>,
    pub frequency: Option<Frequency>,
    pub weekday: Option<u8>,
    pub time_of_day: Option<NaiveTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub fixed_price: Option<Option<f64>>,
    pub price_category_id: Option<Option<Uuid>>,
    pub notes: Option<String>,
}

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Schedule, SchedulingError> {
    schedule_repo::get_schedule(conn, id)?.ok_or(SchedulingError::ScheduleNotFound { id: *id })
}

/// Active schedules with patient display fields, newest start date first.
pub fn list_schedules(conn: &Connection) -> Result<Vec<ScheduleWithPatient>, SchedulingError> {
    Ok(schedule_repo::list_active_with_patients(conn)?)
}

/// Validate and insert a new schedule. Conflict check and insert commit
/// together; a rejected check leaves no partial state.
pub fn create_schedule(
    conn: &mut Connection,
    input: CreateScheduleInput,
) -> Result<Schedule, SchedulingError> {
    let tx = conn.transaction()?;
    let schedule = create_in_tx(&tx, input)?;
    tx.commit()?;
    Ok(schedule)
}

fn create_in_tx(
    conn: &Connection,
    input: CreateScheduleInput,
) -> Result<Schedule, SchedulingError> {
    let schedule = validate_new(input)?;

    conflict::check_conflict(
        conn,
        &ConflictCheck {
            weekday: schedule.weekday,
            time_of_day: schedule.time_of_day,
            start_date: schedule.start_date,
            end_date: schedule.end_date,
            frequency: schedule.frequency,
            exclude_id: None,
        },
    )?;

    schedule_repo::insert_schedule(conn, &schedule)?;
    tracing::info!(schedule_id = %schedule.id, "Created schedule");
    Ok(schedule)
}

fn validate_new(input: CreateScheduleInput) -> Result<Schedule, SchedulingError> {
    let derived = weekday_index(input.start_date);
    let weekday = match input.weekday {
        None => derived,
        Some(day) if day > 6 => {
            return Err(SchedulingError::Validation(format!(
                "weekday must be 0-6, got {day}"
            )))
        }
        // For weekly schedules the claimed weekday and the anchor date must
        // agree, or the first occurrence would not fall on the start date.
        Some(day) if input.frequency == Frequency::Weekly && day != derived => {
            return Err(SchedulingError::Validation(format!(
                "weekday {day} does not match the start date's weekday {derived}"
            )));
        }
        Some(day) => day,
    };

    // A one-off is a single-day window.
    let end_date = match (input.frequency, input.end_date) {
        (Frequency::Once, None) => Some(input.start_date),
        (_, end) => end,
    };

    if matches!(end_date, Some(end) if end < input.start_date) {
        return Err(SchedulingError::Validation(
            "end date precedes start date".into(),
        ));
    }

    if input.fixed_price.is_some() && input.price_category_id.is_some() {
        return Err(SchedulingError::Validation(
            "fixed price and price category are mutually exclusive".into(),
        ));
    }

    Ok(Schedule {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        frequency: input.frequency,
        weekday,
        time_of_day: input.time_of_day,
        start_date: input.start_date,
        end_date,
        fixed_price: input.fixed_price,
        price_category_id: input.price_category_id,
        active: true,
        notes: input.notes,
    })
}

/// Apply an update in one of two modes:
///
/// - `Overwrite` mutates the row in place, re-running the conflict check
///   (excluding the row itself) when any slot-relevant field changes.
/// - `History` closes the existing row the day before `cutoff` (default
///   today) and creates a brand-new row starting at the cutoff, preserving
///   the old row — and its ledger — as history.
pub fn update_schedule(
    conn: &mut Connection,
    id: &Uuid,
    input: UpdateScheduleInput,
    mode: UpdateMode,
    cutoff: Option<NaiveDate>,
) -> Result<Schedule, SchedulingError> {
    let tx = conn.transaction()?;
    let existing = schedule_repo::get_schedule(&tx, id)?
        .ok_or(SchedulingError::ScheduleNotFound { id: *id })?;

    let updated = match mode {
        UpdateMode::History => {
            let new_start = cutoff.unwrap_or_else(|| Local::now().date_naive());
            let previous_end = new_start
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| SchedulingError::Validation("cutoff out of range".into()))?;
            schedule_repo::set_end_date(&tx, id, previous_end)?;

            // An inherited end date before the new period would create an
            // inverted range; the new row becomes open-ended instead.
            let inherited_end = input.end_date.unwrap_or(existing.end_date);
            let end_date = inherited_end.filter(|end| *end >= new_start);

            create_in_tx(
                &tx,
                CreateScheduleInput {
                    patient_id: input.patient_id.unwrap_or(existing.patient_id),
                    frequency: input.frequency.unwrap_or(existing.frequency),
                    weekday: input.weekday,
                    time_of_day: input.time_of_day.unwrap_or(existing.time_of_day),
                    start_date: new_start,
                    end_date,
                    fixed_price: input.fixed_price.unwrap_or(existing.fixed_price),
                    price_category_id: input
                        .price_category_id
                        .unwrap_or(existing.price_category_id),
                    notes: input.notes.clone().or_else(|| existing.notes.clone()),
                },
            )?
        }
        UpdateMode::Overwrite => {
            let slot_changed = input.weekday.is_some()
                || input.time_of_day.is_some()
                || input.start_date.is_some()
                || input.end_date.is_some()
                || input.frequency.is_some();

            let frequency = input.frequency.unwrap_or(existing.frequency);
            let start_date = input.start_date.unwrap_or(existing.start_date);
            let weekday = match input.weekday {
                Some(day) => day,
                // A moved anchor drags the derived weekday along.
                None if input.start_date.is_some() => weekday_index(start_date),
                None => existing.weekday,
            };
            let time_of_day = input.time_of_day.unwrap_or(existing.time_of_day);
            let mut end_date = input.end_date.unwrap_or(existing.end_date);
            if frequency == Frequency::Once && end_date.is_none() {
                end_date = Some(start_date);
            }

            let updated = validate_merged(Schedule {
                id: existing.id,
                patient_id: input.patient_id.unwrap_or(existing.patient_id),
                frequency,
                weekday,
                time_of_day,
                start_date,
                end_date,
                fixed_price: input.fixed_price.unwrap_or(existing.fixed_price),
                price_category_id: input
                    .price_category_id
                    .unwrap_or(existing.price_category_id),
                active: existing.active,
                notes: input.notes.or(existing.notes),
            })?;

            if slot_changed {
                conflict::check_conflict(
                    &tx,
                    &ConflictCheck {
                        weekday: updated.weekday,
                        time_of_day: updated.time_of_day,
                        start_date: updated.start_date,
                        end_date: updated.end_date,
                        frequency: updated.frequency,
                        exclude_id: Some(updated.id),
                    },
                )?;
            }

            schedule_repo::update_schedule(&tx, &updated)?;
            updated
        }
    };

    tx.commit()?;
    Ok(updated)
}

fn validate_merged(schedule: Schedule) -> Result<Schedule, SchedulingError> {
    if schedule.weekday > 6 {
        return Err(SchedulingError::Validation(format!(
            "weekday must be 0-6, got {}",
            schedule.weekday
        )));
    }
    if schedule.frequency == Frequency::Weekly
        && schedule.weekday != weekday_index(schedule.start_date)
    {
        return Err(SchedulingError::Validation(format!(
            "weekday {} does not match the start date's weekday {}",
            schedule.weekday,
            weekday_index(schedule.start_date)
        )));
    }
    if matches!(schedule.end_date, Some(end) if end < schedule.start_date) {
        return Err(SchedulingError::Validation(
            "end date precedes start date".into(),
        ));
    }
    if schedule.fixed_price.is_some() && schedule.price_category_id.is_some() {
        return Err(SchedulingError::Validation(
            "fixed price and price category are mutually exclusive".into(),
        ));
    }
    Ok(schedule)
}

/// Close a schedule's recurrence: no occurrences are generated after
/// `end_date`. The row stays active so history keeps rendering.
pub fn terminate_schedule(
    conn: &Connection,
    id: &Uuid,
    end_date: NaiveDate,
) -> Result<(), SchedulingError> {
    let changed = schedule_repo::set_end_date(conn, id, end_date)?;
    if changed == 0 {
        return Err(SchedulingError::ScheduleNotFound { id: *id });
    }
    tracing::info!(schedule_id = %id, %end_date, "Terminated schedule");
    Ok(())
}

/// Deactivate a schedule entirely: it stops materializing and stops
/// claiming its slot. The row is kept — exceptions reference it.
pub fn soft_delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), SchedulingError> {
    let changed = schedule_repo::set_active(conn, id, false)?;
    if changed == 0 {
        return Err(SchedulingError::ScheduleNotFound { id: *id });
    }
    tracing::info!(schedule_id = %id, "Soft-deleted schedule");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::patient;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Patient;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, min, 0).unwrap()
    }

    fn insert_test_patient(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        patient::insert_patient(
            conn,
            &Patient {
                id,
                full_name: name.into(),
                email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            },
        )
        .unwrap();
        id
    }

    fn weekly_input(patient_id: Uuid, start: NaiveDate, time: NaiveTime) -> CreateScheduleInput {
        CreateScheduleInput {
            patient_id,
            frequency: Frequency::Weekly,
            weekday: None,
            time_of_day: time,
            start_date: start,
            end_date: None,
            fixed_price: Some(150.0),
            price_category_id: None,
            notes: None,
        }
    }

    #[test]
    fn create_derives_weekday_from_start_date() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let schedule =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();
        assert_eq!(schedule.weekday, 1); // Monday
        assert!(schedule.active);
    }

    #[test]
    fn create_once_defaults_end_to_start() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let schedule = create_schedule(
            &mut conn,
            CreateScheduleInput {
                frequency: Frequency::Once,
                ..weekly_input(patient_id, d(2026, 3, 2), t(10, 0))
            },
        )
        .unwrap();
        assert_eq!(schedule.end_date, Some(d(2026, 3, 2)));
    }

    #[test]
    fn create_rejects_weekly_weekday_mismatch() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let result = create_schedule(
            &mut conn,
            CreateScheduleInput {
                weekday: Some(3),
                ..weekly_input(patient_id, d(2026, 3, 2), t(10, 0))
            },
        );
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn create_rejects_inverted_range() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let result = create_schedule(
            &mut conn,
            CreateScheduleInput {
                end_date: Some(d(2026, 2, 1)),
                ..weekly_input(patient_id, d(2026, 3, 2), t(10, 0))
            },
        );
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn create_rejects_double_price_source() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let result = create_schedule(
            &mut conn,
            CreateScheduleInput {
                fixed_price: Some(100.0),
                price_category_id: Some(Uuid::new_v4()),
                ..weekly_input(patient_id, d(2026, 3, 2), t(10, 0))
            },
        );
        assert!(matches!(result, Err(SchedulingError::Validation(_))));
    }

    #[test]
    fn create_rejects_conflicting_slot_and_writes_nothing() {
        let mut conn = open_memory_database().unwrap();
        let patient_a = insert_test_patient(&conn, "Ana Souza");
        let patient_b = insert_test_patient(&conn, "Bruno Lima");
        create_schedule(&mut conn, weekly_input(patient_a, d(2026, 3, 2), t(10, 0))).unwrap();

        let result = create_schedule(&mut conn, weekly_input(patient_b, d(2026, 3, 9), t(10, 0)));
        assert!(matches!(
            result,
            Err(SchedulingError::ScheduleConflict { patient_id }) if patient_id == patient_a
        ));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn list_returns_active_with_patient_fields() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let kept =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();
        let deleted =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 3), t(11, 0))).unwrap();
        soft_delete_schedule(&conn, &deleted.id).unwrap();

        let listed = list_schedules(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].schedule.id, kept.id);
        assert_eq!(listed[0].patient_name.as_deref(), Some("Ana Souza"));
    }

    #[test]
    fn overwrite_update_revalidates_conflicts() {
        let mut conn = open_memory_database().unwrap();
        let patient_a = insert_test_patient(&conn, "Ana Souza");
        let patient_b = insert_test_patient(&conn, "Bruno Lima");
        create_schedule(&mut conn, weekly_input(patient_a, d(2026, 3, 2), t(10, 0))).unwrap();
        let movable =
            create_schedule(&mut conn, weekly_input(patient_b, d(2026, 3, 2), t(11, 0))).unwrap();

        // Moving into the occupied slot fails...
        let result = update_schedule(
            &mut conn,
            &movable.id,
            UpdateScheduleInput {
                time_of_day: Some(t(10, 0)),
                ..Default::default()
            },
            UpdateMode::Overwrite,
            None,
        );
        assert!(matches!(
            result,
            Err(SchedulingError::ScheduleConflict { .. })
        ));

        // ...and the row is untouched.
        let unchanged = get_schedule(&conn, &movable.id).unwrap();
        assert_eq!(unchanged.time_of_day, t(11, 0));

        // A free slot is accepted.
        let updated = update_schedule(
            &mut conn,
            &movable.id,
            UpdateScheduleInput {
                time_of_day: Some(t(12, 0)),
                ..Default::default()
            },
            UpdateMode::Overwrite,
            None,
        )
        .unwrap();
        assert_eq!(updated.time_of_day, t(12, 0));
        assert_eq!(updated.id, movable.id);
    }

    #[test]
    fn overwrite_update_is_not_blocked_by_itself() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let schedule =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();

        // Only the end date changes; the slot claim overlaps itself.
        let updated = update_schedule(
            &mut conn,
            &schedule.id,
            UpdateScheduleInput {
                end_date: Some(Some(d(2026, 6, 29))),
                ..Default::default()
            },
            UpdateMode::Overwrite,
            None,
        )
        .unwrap();
        assert_eq!(updated.end_date, Some(d(2026, 6, 29)));
    }

    #[test]
    fn overwrite_moving_start_rederives_weekday() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let schedule =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();

        let updated = update_schedule(
            &mut conn,
            &schedule.id,
            UpdateScheduleInput {
                start_date: Some(d(2026, 3, 4)), // Wednesday
                ..Default::default()
            },
            UpdateMode::Overwrite,
            None,
        )
        .unwrap();
        assert_eq!(updated.weekday, 3);
    }

    #[test]
    fn history_update_closes_old_row_and_creates_new() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let original =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();

        let cutoff = d(2026, 4, 6); // a Monday
        let replacement = update_schedule(
            &mut conn,
            &original.id,
            UpdateScheduleInput {
                time_of_day: Some(t(14, 0)),
                ..Default::default()
            },
            UpdateMode::History,
            Some(cutoff),
        )
        .unwrap();

        assert_ne!(replacement.id, original.id);
        assert_eq!(replacement.start_date, cutoff);
        assert_eq!(replacement.time_of_day, t(14, 0));
        assert_eq!(replacement.fixed_price, original.fixed_price);

        let closed = get_schedule(&conn, &original.id).unwrap();
        assert_eq!(closed.end_date, Some(d(2026, 4, 5)));
        assert!(closed.active, "history rows stay active");
    }

    #[test]
    fn history_update_clears_stale_end_date() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let original = create_schedule(
            &mut conn,
            CreateScheduleInput {
                end_date: Some(d(2026, 3, 30)),
                ..weekly_input(patient_id, d(2026, 3, 2), t(10, 0))
            },
        )
        .unwrap();

        // Cutoff beyond the inherited end date: the new period is open-ended.
        let replacement = update_schedule(
            &mut conn,
            &original.id,
            UpdateScheduleInput::default(),
            UpdateMode::History,
            Some(d(2026, 5, 4)),
        )
        .unwrap();
        assert_eq!(replacement.end_date, None);
    }

    #[test]
    fn terminate_sets_end_date() {
        let mut conn = open_memory_database().unwrap();
        let patient_id = insert_test_patient(&conn, "Ana Souza");
        let schedule =
            create_schedule(&mut conn, weekly_input(patient_id, d(2026, 3, 2), t(10, 0))).unwrap();

        terminate_schedule(&conn, &schedule.id, d(2026, 6, 29)).unwrap();
        assert_eq!(
            get_schedule(&conn, &schedule.id).unwrap().end_date,
            Some(d(2026, 6, 29))
        );
    }

    #[test]
    fn missing_schedule_is_reported() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(
            terminate_schedule(&conn, &id, d(2026, 6, 29)),
            Err(SchedulingError::ScheduleNotFound { .. })
        ));
        assert!(matches!(
            soft_delete_schedule(&conn, &id),
            Err(SchedulingError::ScheduleNotFound { .. })
        ));
        assert!(matches!(
            get_schedule(&conn, &id),
            Err(SchedulingError::ScheduleNotFound { .. })
        ));
    }
}
