use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::OccurrenceStatus;

/// Domain errors raised synchronously to the caller of the operation that
/// detected them. Conflicts and invalid transitions are user-correctable,
/// not transient: no internal retries, no partial writes on failure.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Slot conflicts with an existing schedule (patient {patient_id})")]
    ScheduleConflict { patient_id: Uuid },

    #[error("Schedule not found: {id}")]
    ScheduleNotFound { id: Uuid },

    #[error("Occurrence is {status} and cannot be modified", status = .status.as_str())]
    InvalidTransition { status: OccurrenceStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
