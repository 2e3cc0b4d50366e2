use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Application-level constants
pub const APP_NAME: &str = "clinic-agenda";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME").replace('-', "_"))
}

const DEFAULT_UTC_OFFSET_SECS: i32 = -3 * 3600;

/// Clinic-wide calendar configuration.
///
/// The engine works in clinic wall-clock time throughout; the offset is
/// applied once, when the materializer renders slot datetimes for
/// consumers. Defaults to UTC-3, the zone the system was originally
/// deployed in.
#[derive(Debug, Clone, Copy)]
pub struct CalendarConfig {
    pub utc_offset: FixedOffset,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            // Offset is within FixedOffset's valid range, so this cannot fail.
            utc_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS)
                .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid")),
        }
    }
}

impl CalendarConfig {
    /// Attach the clinic offset to a wall-clock datetime.
    pub fn localize(&self, at: NaiveDateTime) -> DateTime<FixedOffset> {
        DateTime::from_naive_utc_and_offset(at - self.utc_offset, self.utc_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_offset_is_minus_three_hours() {
        let config = CalendarConfig::default();
        assert_eq!(config.utc_offset.local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn localize_preserves_wall_clock() {
        let config = CalendarConfig::default();
        let at = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let localized = config.localize(at);
        assert_eq!(localized.naive_local(), at);
        assert_eq!(localized.to_rfc3339(), "2026-03-02T10:00:00-03:00");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
