//! The "does date D match recurrence R" predicate — the algorithmic heart
//! shared by the materializer (slot generation) and the conflict detector
//! (lands-on checks). Frequencies are a tagged variant with the anchor made
//! explicit so matching is exhaustive at compile time.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recurrence {
    /// Matches only the anchor date itself.
    Once(NaiveDate),
    /// Matches every date whose weekday (0=Sunday .. 6=Saturday) equals the
    /// claimed weekday.
    Weekly(u8),
    /// Matches dates a whole number of fortnights from the anchor.
    Biweekly(NaiveDate),
    /// Matches dates sharing the anchor's day-of-month. Anchors on day 29-31
    /// generate nothing in months too short to reach them (inherited
    /// behavior).
    Monthly(NaiveDate),
}

impl Recurrence {
    pub fn from_parts(frequency: Frequency, weekday: u8, start_date: NaiveDate) -> Self {
        match frequency {
            Frequency::Once => Self::Once(start_date),
            Frequency::Weekly => Self::Weekly(weekday),
            Frequency::Biweekly => Self::Biweekly(start_date),
            Frequency::Monthly => Self::Monthly(start_date),
        }
    }

    /// Whether `date` is an occurrence of this rule, ignoring the schedule's
    /// date range (callers clamp the walk to `[start_date, end_date]`).
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            Self::Once(anchor) => date == anchor,
            Self::Weekly(weekday) => weekday_index(date) == weekday,
            Self::Biweekly(anchor) => (date - anchor).num_days() % 14 == 0,
            Self::Monthly(anchor) => date.day() == anchor.day(),
        }
    }
}

/// Weekday as 0=Sunday .. 6=Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}
