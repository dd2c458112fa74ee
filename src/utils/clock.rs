//! Timestamp and calendar helpers. All times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};

/// Formats a timestamp as RFC3339 with second precision and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Returns the current time formatted by [`format_timestamp`].
pub fn utc_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Returns the Monday that starts the week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}
