//! Parsing of free-form metadata dates.
//!
//! Accepted formats, tried in order:
//!
//! | Format                  | Example                          |
//! |-------------------------|----------------------------------|
//! | RFC 3339                | `2024-03-01T10:30:00+01:00`      |
//! | RFC 2822                | `Fri, 01 Mar 2024 10:30:00 GMT`  |
//! | date and time           | `2024-03-01 10:30:00`            |
//! | date and time, no secs  | `2024-03-01 10:30`               |
//! | ISO date                | `2024-03-01`                     |
//! | slashed date            | `2024/03/01`                     |
//! | long date               | `March 1, 2024`                  |
//!
//! Values without an offset are taken as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y"];

/// Parse a metadata date string.
pub fn parse(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}
