//! Time and calendar arithmetic for the weekly schedule.
//!
//! All session-time math works on minutes since midnight with half-open
//! intervals: `[start, start + duration)`. Two back-to-back sessions share a
//! boundary minute but do not overlap.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};

/// Convert a time of day to minutes since midnight.
pub fn minutes_since_midnight(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Half-open interval overlap test on minutes since midnight.
///
/// Returns true iff `[start_a, start_a+dur_a)` and `[start_b, start_b+dur_b)`
/// intersect. Touching endpoints (`end_a == start_b`) do not overlap.
pub fn overlaps(start_a: u32, dur_a: u32, start_b: u32, dur_b: u32) -> bool {
    start_a < start_b + dur_b && start_b < start_a + dur_a
}

/// Parse a wall-clock time in `HH:MM` form.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Format a time of day as `HH:MM`.
pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// ISO-8601 week identifier used as the storage partition key.
///
/// Uses the ISO week-year rather than the calendar year so that dates around
/// New Year land in an unambiguous partition (e.g. 2024-12-30 is `2025-01`).
pub fn week_key(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-{:02}", iso.year(), iso.week())
}

/// Day offset of a weekday from Monday.
pub fn weekday_offset(weekday: Weekday) -> i64 {
    weekday.num_days_from_monday() as i64
}

/// Lowercase English weekday name, used as the availability map key.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Inverse of [`weekday_name`].
pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Unique key for a session slot: `"{date}|{HH:MM}"`.
pub fn session_key(date: NaiveDate, start: NaiveTime) -> String {
    format!("{}|{}", format_date(date), format_time(start))
}

/// Parse a session key back into its date and start time.
pub fn parse_session_key(key: &str) -> Option<(NaiveDate, NaiveTime)> {
    let (date_str, time_str) = key.split_once('|')?;
    Some((parse_date(date_str)?, parse_time(time_str)?))
}
