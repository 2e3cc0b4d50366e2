pub mod exception;
pub mod patient;
pub mod pricing;
pub mod schedule;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{DatabaseError, DATETIME_FMT, DATE_FMT, TIME_FMT};

// TEXT column codecs. Everything is stored as fixed-format strings so that
// lexicographic comparison in SQL matches chronological order.

pub(crate) fn fmt_datetime(at: NaiveDateTime) -> String {
    at.format(DATETIME_FMT).to_string()
}

pub(crate) fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub(crate) fn fmt_time(time: NaiveTime) -> String {
    time.format(TIME_FMT).to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|_| DatabaseError::ConstraintViolation(
        format!("unparseable datetime: {s}"),
    ))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("unparseable date: {s}")))
}

pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, DatabaseError> {
    // Accept HH:MM and HH:MM:SS; the latter shows up when rows were seeded
    // by external tooling.
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| DatabaseError::ConstraintViolation(format!("unparseable time: {s}")))
}

pub(crate) fn parse_uuid(s: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(s)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
