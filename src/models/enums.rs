use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Frequency {
    Once => "once",
    Weekly => "weekly",
    Biweekly => "biweekly",
    Monthly => "monthly",
});

str_enum!(OccurrenceStatus {
    Scheduled => "scheduled",
    Realized => "realized",
    NoShow => "no_show",
    Cancelled => "cancelled",
});

impl OccurrenceStatus {
    /// Terminal states block reschedule / no-show / cancel; only confirm
    /// may still act on them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Realized | Self::NoShow | Self::Cancelled)
    }
}

str_enum!(EventKind {
    VirtualSlot => "virtual_slot",
    Occurrence => "occurrence",
});

// Status carried by a calendar event: the ledger statuses plus two
// synthetic ones that exist only in the projection.
str_enum!(EventStatus {
    Available => "available",
    Scheduled => "scheduled",
    Realized => "realized",
    NoShow => "no_show",
    Cancelled => "cancelled",
    RescheduledOrigin => "rescheduled_origin",
});

impl From<OccurrenceStatus> for EventStatus {
    fn from(status: OccurrenceStatus) -> Self {
        match status {
            OccurrenceStatus::Scheduled => Self::Scheduled,
            OccurrenceStatus::Realized => Self::Realized,
            OccurrenceStatus::NoShow => Self::NoShow,
            OccurrenceStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// How `agenda::update_schedule` applies changes: mutate the row in place,
/// or close it out and start a fresh row at a cutoff date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    Overwrite,
    History,
}
