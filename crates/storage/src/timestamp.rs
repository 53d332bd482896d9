//! Timestamp serialization shared by every backend.
//!
//! All persisted timestamps use the fixed-width UTC form
//! `YYYY-MM-DDTHH:MM:SS.ffffffZ`, so comparing the strings compares the
//! instants. Partitions are UTC calendar dates of `created_at`.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Format an instant as a fixed-width UTC timestamp with microseconds.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let utc = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        utc.year(),
        utc.month() as u8,
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second(),
        utc.microsecond()
    )
}

/// Parse a persisted timestamp.
///
/// Accepts RFC 3339 (with any offset), the offset-less ISO form written by
/// older jobs, and the warehouse's `YYYY-MM-DD HH:MM:SS[.f] UTC` rendering.
/// Offset-less forms are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(at);
    }
    let iso = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    let spaced = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    let s = s.strip_suffix(" UTC").unwrap_or(s);
    PrimitiveDateTime::parse(s, iso)
        .or_else(|_| PrimitiveDateTime::parse(s, spaced))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Format a partition date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Parse a `YYYY-MM-DD` partition date.
pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// The partition (UTC date) a timestamp falls into.
pub fn partition_of(timestamp: &str) -> Option<Date> {
    parse_timestamp(timestamp).map(|at| at.to_offset(UtcOffset::UTC).date())
}

/// The first instant of a partition, formatted for range comparisons.
pub fn partition_start(date: Date) -> String {
    format_timestamp(date.midnight().assume_utc())
}
