//! Price lookup for occurrence snapshots. Price-list management happens
//! outside this crate; the engine only ever asks "what does a session of
//! this schedule cost on this date".

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::repository::pricing as price_repo;
use crate::db::DatabaseError;
use crate::models::Schedule;

/// Resolve the amount a session of `schedule` costs on `date`.
///
/// A fixed override on the schedule wins; otherwise the schedule's price
/// category is consulted for the window covering `date`; schedules with
/// neither are free (0).
pub fn session_price(
    conn: &Connection,
    schedule: &Schedule,
    date: NaiveDate,
) -> Result<f64, DatabaseError> {
    if let Some(fixed) = schedule.fixed_price {
        return Ok(fixed);
    }

    if let Some(category_id) = schedule.price_category_id {
        if let Some(amount) = price_repo::price_on_date(conn, &category_id, date)? {
            return Ok(amount);
        }
    }

    Ok(0.0)
}
