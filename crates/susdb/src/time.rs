//! Time utilities for SusDB.
//!
//! `created_on` values are RFC 3339 strings in UTC with microsecond
//! precision, e.g. `2024-05-01T12:30:45.123456Z`.

use chrono::{DateTime, SecondsFormat, Utc};

/// Return the current time formatted for the `created_on` field.
pub fn now_rfc3339() -> String {
    to_rfc3339(Utc::now())
}

/// Format a timestamp the way `created_on` stores it.
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored `created_on` value back into a timestamp.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
