pub mod sqlite;
pub mod repository;

pub use sqlite::*;

use thiserror::Error;

/// Wall-clock datetime format used for exception slot keys (TEXT columns).
/// Lexicographic order matches chronological order, which the range queries
/// rely on.
pub const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Calendar date format for schedule and price windows.
pub const DATE_FMT: &str = "%Y-%m-%d";

/// Time-of-day format for schedule slots.
pub const TIME_FMT: &str = "%H:%M";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}
