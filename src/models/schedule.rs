use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Frequency;
use crate::recurrence::Recurrence;

/// A recurrence definition: one patient claiming one weekday/time slot over
/// a date range. Every occurrence shares the schedule's time of day and has
/// no duration (point-in-time events).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub frequency: Frequency,
    /// 0=Sunday .. 6=Saturday. Authoritative for `weekly`; for the other
    /// frequencies it mirrors `start_date`'s weekday.
    pub weekday: u8,
    pub time_of_day: NaiveTime,
    pub start_date: NaiveDate,
    /// `None` means open-ended. For `once` this is the start date itself.
    pub end_date: Option<NaiveDate>,
    pub fixed_price: Option<f64>,
    pub price_category_id: Option<Uuid>,
    pub active: bool,
    pub notes: Option<String>,
}

impl Schedule {
    /// The recurrence rule with its anchor made explicit.
    pub fn recurrence(&self) -> Recurrence {
        Recurrence::from_parts(self.frequency, self.weekday, self.start_date)
    }
}

/// A schedule joined with its patient's display fields. The patient
/// directory is a collaborator, not owned: a dangling reference degrades to
/// `None` rather than failing the read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWithPatient {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
}
