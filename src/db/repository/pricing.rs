use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::fmt_date;
use crate::db::DatabaseError;
use crate::models::{PriceCategory, PriceValue};

pub fn insert_price_category(
    conn: &Connection,
    category: &PriceCategory,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO price_categories (id, name, description, active) VALUES (?1, ?2, ?3, ?4)",
        params![
            category.id.to_string(),
            category.name,
            category.description,
            category.active as i32,
        ],
    )?;
    Ok(())
}

pub fn insert_price_value(conn: &Connection, value: &PriceValue) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO price_values (id, category_id, amount, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            value.id.to_string(),
            value.category_id.to_string(),
            value.amount,
            fmt_date(value.start_date),
            value.end_date.map(fmt_date),
        ],
    )?;
    Ok(())
}

/// The category price in effect on the given date: the window containing
/// the date with the latest start, open-ended windows included.
pub fn price_on_date(
    conn: &Connection,
    category_id: &Uuid,
    date: NaiveDate,
) -> Result<Option<f64>, DatabaseError> {
    let result = conn.query_row(
        "SELECT amount FROM price_values
         WHERE category_id = ?1
           AND start_date <= ?2
           AND (end_date IS NULL OR end_date >= ?2)
         ORDER BY start_date DESC
         LIMIT 1",
        params![category_id.to_string(), fmt_date(date)],
        |row| row.get::<_, f64>(0),
    );

    match result {
        Ok(amount) => Ok(Some(amount)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
