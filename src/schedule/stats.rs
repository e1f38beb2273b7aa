//! Weekly schedule statistics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::schedule::time::weekday_name;
use crate::schedule::types::Session;

/// Aggregate numbers for one merged week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekStats {
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Sunday of the week.
    pub week_end: NaiveDate,
    /// Sessions in the merged week.
    pub total_sessions: usize,
    /// Session count per weekday name, only days with sessions present.
    pub sessions_per_weekday: BTreeMap<String, usize>,
    /// Distinct persons appearing in any session.
    pub unique_persons: usize,
    /// Distinct resources appearing in any session.
    pub unique_resources: usize,
    /// Sum of session durations, in hours.
    pub total_hours: f32,
    /// Session count per session type.
    pub sessions_per_type: BTreeMap<String, usize>,
    /// Sessions backed by a template (generated or modified).
    pub from_template: usize,
    /// Mean session duration in minutes, zero for an empty week.
    pub mean_duration_minutes: f32,
}

/// Compute statistics for a merged week.
pub fn week_stats(week_start: NaiveDate, sessions: &[Session]) -> WeekStats {
    let mut per_weekday: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut persons: BTreeSet<&str> = BTreeSet::new();
    let mut resources: BTreeSet<&str> = BTreeSet::new();
    let mut total_minutes: u64 = 0;
    let mut from_template = 0;

    for session in sessions {
        *per_weekday
            .entry(weekday_name(session.weekday).to_string())
            .or_insert(0) += 1;
        *per_type.entry(session.session_type.clone()).or_insert(0) += 1;
        persons.extend(session.person_ids.iter().map(String::as_str));
        resources.extend(session.resource_ids.iter().map(String::as_str));
        total_minutes += session.duration_minutes as u64;
        if session.template_id.is_some() {
            from_template += 1;
        }
    }

    let mean_duration_minutes = if sessions.is_empty() {
        0.0
    } else {
        total_minutes as f32 / sessions.len() as f32
    };

    WeekStats {
        week_start,
        week_end: week_start + Duration::days(6),
        total_sessions: sessions.len(),
        sessions_per_weekday: per_weekday,
        unique_persons: persons.len(),
        unique_resources: resources.len(),
        total_hours: total_minutes as f32 / 60.0,
        sessions_per_type: per_type,
        from_template,
        mean_duration_minutes,
    }
}
