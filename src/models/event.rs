use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EventKind, EventStatus};

/// One row of the materializer's output. Ephemeral: produced fresh on every
/// `generate_calendar` call and carries no identity across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Where the event is drawn on the grid.
    pub display_at: DateTime<FixedOffset>,
    /// The canonical slot this event belongs to.
    pub original_at: DateTime<FixedOffset>,
    /// For rescheduled-origin ghosts: where the occurrence moved to.
    pub moved_to: Option<DateTime<FixedOffset>>,
    pub kind: EventKind,
    pub status: EventStatus,
    pub schedule_id: Uuid,
    /// Set when the event is backed by a ledger row.
    pub exception_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_email: Option<String>,
    /// A recurring slot that is effectively empty (cancelled, or moved away)
    /// and may be claimed by a one-off schedule.
    pub freeable: bool,
}
