use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_date, fmt_time, parse_date, parse_time, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Frequency, Schedule, ScheduleWithPatient};

const SCHEDULE_COLUMNS: &str = "id, patient_id, frequency, weekday, time_of_day, start_date, \
     end_date, fixed_price, price_category_id, active, notes";

pub fn insert_schedule(conn: &Connection, schedule: &Schedule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO schedules (id, patient_id, frequency, weekday, time_of_day, start_date,
         end_date, fixed_price, price_category_id, active, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            schedule.id.to_string(),
            schedule.patient_id.to_string(),
            schedule.frequency.as_str(),
            schedule.weekday as i64,
            fmt_time(schedule.time_of_day),
            fmt_date(schedule.start_date),
            schedule.end_date.map(fmt_date),
            schedule.fixed_price,
            schedule.price_category_id.map(|id| id.to_string()),
            schedule.active as i32,
            schedule.notes,
        ],
    )?;
    Ok(())
}

pub fn update_schedule(conn: &Connection, schedule: &Schedule) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE schedules SET patient_id = ?2, frequency = ?3, weekday = ?4, time_of_day = ?5,
         start_date = ?6, end_date = ?7, fixed_price = ?8, price_category_id = ?9,
         active = ?10, notes = ?11
         WHERE id = ?1",
        params![
            schedule.id.to_string(),
            schedule.patient_id.to_string(),
            schedule.frequency.as_str(),
            schedule.weekday as i64,
            fmt_time(schedule.time_of_day),
            fmt_date(schedule.start_date),
            schedule.end_date.map(fmt_date),
            schedule.fixed_price,
            schedule.price_category_id.map(|id| id.to_string()),
            schedule.active as i32,
            schedule.notes,
        ],
    )?;
    Ok(())
}

pub fn set_end_date(
    conn: &Connection,
    id: &Uuid,
    end_date: NaiveDate,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE schedules SET end_date = ?2 WHERE id = ?1",
        params![id.to_string(), fmt_date(end_date)],
    )?;
    Ok(changed)
}

pub fn set_active(conn: &Connection, id: &Uuid, active: bool) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE schedules SET active = ?2 WHERE id = ?1",
        params![id.to_string(), active as i32],
    )?;
    Ok(changed)
}

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Option<Schedule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], |row| Ok(schedule_row_from_rusqlite(row)));

    match result {
        Ok(row) => Ok(Some(schedule_from_row(row?)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All active schedules joined with patient display fields, newest start
/// date first. Malformed rows are logged and skipped rather than failing
/// the whole read.
pub fn list_active_with_patients(
    conn: &Connection,
) -> Result<Vec<ScheduleWithPatient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT s.{}, p.full_name, p.email
         FROM schedules s LEFT JOIN patients p ON p.id = s.patient_id
         WHERE s.active = 1
         ORDER BY s.start_date DESC",
        SCHEDULE_COLUMNS.replace(", ", ", s.")
    ))?;

    let rows = stmt.query_map([], |row| {
        let schedule = schedule_row_from_rusqlite(row)?;
        let patient_name: Option<String> = row.get(11)?;
        let patient_email: Option<String> = row.get(12)?;
        Ok((schedule, patient_name, patient_email))
    })?;

    let mut schedules = Vec::new();
    for row in rows {
        let (raw, patient_name, patient_email) = row?;
        match schedule_from_row(raw) {
            Ok(schedule) => schedules.push(ScheduleWithPatient {
                schedule,
                patient_name,
                patient_email,
            }),
            Err(e) => tracing::warn!("Skipping malformed schedule row: {e}"),
        }
    }
    Ok(schedules)
}

/// Active schedules claiming the same weekday/time slot, optionally
/// excluding the schedule under edit. The conflict detector's candidate set.
pub fn list_slot_candidates(
    conn: &Connection,
    weekday: u8,
    time_of_day: NaiveTime,
    exclude_id: Option<&Uuid>,
) -> Result<Vec<Schedule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules
         WHERE active = 1 AND weekday = ?1 AND time_of_day = ?2
           AND (?3 IS NULL OR id != ?3)"
    ))?;

    let rows = stmt.query_map(
        params![
            weekday as i64,
            fmt_time(time_of_day),
            exclude_id.map(|id| id.to_string()),
        ],
        |row| Ok(schedule_row_from_rusqlite(row)),
    )?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row??)?);
    }
    Ok(schedules)
}

// Internal row type for Schedule mapping
struct ScheduleRow {
    id: String,
    patient_id: String,
    frequency: String,
    weekday: i64,
    time_of_day: String,
    start_date: String,
    end_date: Option<String>,
    fixed_price: Option<f64>,
    price_category_id: Option<String>,
    active: i32,
    notes: Option<String>,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        frequency: row.get(2)?,
        weekday: row.get(3)?,
        time_of_day: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        fixed_price: row.get(7)?,
        price_category_id: row.get(8)?,
        active: row.get(9)?,
        notes: row.get(10)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<Schedule, DatabaseError> {
    if !(0..=6).contains(&row.weekday) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "weekday out of range: {}",
            row.weekday
        )));
    }
    Ok(Schedule {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        frequency: Frequency::from_str(&row.frequency)?,
        weekday: row.weekday as u8,
        time_of_day: parse_time(&row.time_of_day)?,
        start_date: parse_date(&row.start_date)?,
        end_date: row.end_date.as_deref().map(parse_date).transpose()?,
        fixed_price: row.fixed_price,
        price_category_id: row
            .price_category_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?,
        active: row.active != 0,
        notes: row.notes,
    })
}
