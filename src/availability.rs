//! Bookable availability windows, configured per weekday.
//!
//! A candidate session must be fully contained in one window for its weekday.
//! This is intentionally stricter than the session overlap test: a session
//! merely touching a window's boundary from outside is rejected.

use std::collections::BTreeMap;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AvailabilityError, ManegeError, Result};
use crate::schedule::time::{format_time, minutes_since_midnight, weekday_name};

/// One bookable time range within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Start of the window.
    pub start: NaiveTime,
    /// End of the window (exclusive for containment purposes).
    pub end: NaiveTime,
    /// Display label ("morning", "evening club", ...).
    #[serde(default)]
    pub label: String,
}

impl AvailabilityWindow {
    /// Create a window with an empty label.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            label: String::new(),
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Whether `[start, start+duration]` lies fully inside this window.
    pub fn contains_slot(&self, start: NaiveTime, duration_minutes: u32) -> bool {
        let slot_start = minutes_since_midnight(start);
        let slot_end = slot_start + duration_minutes;
        let win_start = minutes_since_midnight(self.start);
        let win_end = minutes_since_midnight(self.end);
        win_start <= slot_start && slot_end <= win_end
    }
}

/// Per-weekday availability configuration.
///
/// Keyed by lowercase weekday name so the persisted JSON stays readable and
/// stable. Windows within a day are kept sorted and non-overlapping; that
/// invariant is enforced on each [`WeekAvailability::set_day`] write, not
/// globally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekAvailability {
    #[serde(flatten)]
    days: BTreeMap<String, Vec<AvailabilityWindow>>,
}

impl WeekAvailability {
    /// Empty configuration: every slot is rejected with `NoWindows`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Windows configured for a weekday, in start order.
    pub fn windows_for(&self, weekday: Weekday) -> &[AvailabilityWindow] {
        self.days
            .get(weekday_name(weekday))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace a day's windows, validating the day being written.
    ///
    /// Each window must have `start < end`; windows within the day must not
    /// overlap each other (touching ends are allowed).
    pub fn set_day(&mut self, weekday: Weekday, mut windows: Vec<AvailabilityWindow>) -> Result<()> {
        let day = weekday_name(weekday);
        for w in &windows {
            if w.start >= w.end {
                return Err(ManegeError::Validation(format!(
                    "window {}-{} on {day} must start before it ends",
                    format_time(w.start),
                    format_time(w.end),
                )));
            }
        }
        windows.sort_by_key(|w| w.start);
        for pair in windows.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(ManegeError::Validation(format!(
                    "windows {}-{} and {}-{} on {day} overlap",
                    format_time(pair[0].start),
                    format_time(pair[0].end),
                    format_time(pair[1].start),
                    format_time(pair[1].end),
                )));
            }
        }
        if windows.is_empty() {
            self.days.remove(day);
        } else {
            self.days.insert(day.to_string(), windows);
        }
        Ok(())
    }

    /// Remove every window of a weekday.
    pub fn clear_day(&mut self, weekday: Weekday) {
        self.days.remove(weekday_name(weekday));
    }

    /// True when no weekday has any window.
    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }
}

/// Gate a candidate slot against the configured windows for its weekday.
///
/// Fails with [`AvailabilityError::NoWindows`] when the weekday has no
/// configuration at all, and with [`AvailabilityError::OutsideWindows`] when
/// no single window fully contains the slot.
pub fn validate_slot(
    availability: &WeekAvailability,
    weekday: Weekday,
    start: NaiveTime,
    duration_minutes: u32,
) -> Result<()> {
    let windows = availability.windows_for(weekday);
    if windows.is_empty() {
        return Err(AvailabilityError::NoWindows {
            weekday: weekday_name(weekday).to_string(),
        }
        .into());
    }
    if windows
        .iter()
        .any(|w| w.contains_slot(start, duration_minutes))
    {
        return Ok(());
    }
    Err(AvailabilityError::OutsideWindows {
        weekday: weekday_name(weekday).to_string(),
        start: format_time(start),
        duration_minutes,
    }
    .into())
}
