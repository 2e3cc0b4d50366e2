use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::OccurrenceStatus;

/// The recorded deviation of one occurrence from its schedule's default.
/// `(schedule_id, scheduled_at)` is the natural key: at most one row per
/// occurrence, upserted in place by the state machine and never deleted —
/// the ledger doubles as the audit trail billing reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    pub id: Uuid,
    pub schedule_id: Uuid,
    /// The slot this exception belongs to (clinic wall clock).
    pub scheduled_at: NaiveDateTime,
    /// When set and different from `scheduled_at`, the occurrence was moved.
    pub realized_at: Option<NaiveDateTime>,
    /// Price snapshot taken at write time from the original slot date.
    pub charged_amount: f64,
    pub status: OccurrenceStatus,
    /// Controls downstream billing eligibility for no-shows (external concern).
    pub charge_on_no_show: bool,
    /// Prior `realized_at` values, oldest first. Append-only.
    pub reschedule_history: Vec<NaiveDateTime>,
    pub notes: Option<String>,
}

impl Exception {
    /// Whether this occurrence currently sits somewhere other than its slot.
    pub fn moved(&self) -> bool {
        matches!(self.realized_at, Some(at) if at != self.scheduled_at)
    }

    /// Where the occurrence actually is: `realized_at` when set, else the slot.
    pub fn effective_at(&self) -> NaiveDateTime {
        self.realized_at.unwrap_or(self.scheduled_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn exception(scheduled_at: NaiveDateTime, realized_at: Option<NaiveDateTime>) -> Exception {
        Exception {
            id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            scheduled_at,
            realized_at,
            charged_amount: 0.0,
            status: OccurrenceStatus::Scheduled,
            charge_on_no_show: false,
            reschedule_history: Vec::new(),
            notes: None,
        }
    }

    #[test]
    fn moved_requires_differing_realized_at() {
        assert!(!exception(at(2, 10), None).moved());
        assert!(!exception(at(2, 10), Some(at(2, 10))).moved());
        assert!(exception(at(2, 10), Some(at(4, 15))).moved());
    }

    #[test]
    fn effective_at_prefers_realized() {
        assert_eq!(exception(at(2, 10), None).effective_at(), at(2, 10));
        assert_eq!(
            exception(at(2, 10), Some(at(4, 15))).effective_at(),
            at(4, 15)
        );
    }
}
