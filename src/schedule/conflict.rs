//! Double-booking detection.
//!
//! Two sessions conflict when their time windows overlap (half-open, so
//! back-to-back sessions are fine) AND they share at least one person or
//! resource. Overlapping windows with disjoint participants are allowed;
//! several lessons can run side by side in different arenas.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::roster::{PersonId, ResourceId};
use crate::schedule::time::{minutes_since_midnight, overlaps};
use crate::schedule::types::Session;

/// A candidate slot collides with an existing session.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error(
    "conflicts with session {existing_key} ({existing_window}): shared persons {shared_person_ids:?}, shared resources {shared_resource_ids:?}"
)]
pub struct SessionConflict {
    /// Slot key of the existing session.
    pub existing_key: String,
    /// Id of the existing session.
    pub existing_id: String,
    /// Time window of the existing session, e.g. `10:00-11:00`.
    pub existing_window: String,
    /// Persons booked in both.
    pub shared_person_ids: Vec<PersonId>,
    /// Resources booked in both.
    pub shared_resource_ids: Vec<ResourceId>,
}

/// A conflict found between two already-stored sessions of a week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub date: NaiveDate,
    pub first: ConflictSide,
    pub second: ConflictSide,
    pub shared_person_ids: Vec<PersonId>,
    pub shared_resource_ids: Vec<ResourceId>,
}

/// One participant of a [`ScheduleConflict`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictSide {
    pub id: String,
    pub key: String,
    pub window: String,
}

impl ConflictSide {
    fn of(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            key: session.key(),
            window: session.window(),
        }
    }
}

fn shared<T: Ord + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let b_set: BTreeSet<&T> = b.iter().collect();
    let mut out: Vec<T> = a.iter().filter(|x| b_set.contains(x)).cloned().collect();
    out.dedup();
    out
}

/// Check a candidate slot against the sessions of one day.
///
/// `exclude_id` skips the one session being edited, matched by its id only
/// (the stored punctual session's id, or the draft id of the override).
/// A slot-time coincidence with some other session is a real collision and
/// is never excluded.
pub fn find_conflict(
    day_sessions: &[Session],
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: u32,
    person_ids: &[PersonId],
    resource_ids: &[ResourceId],
    exclude_id: Option<&str>,
) -> Option<SessionConflict> {
    let start = minutes_since_midnight(start_time);
    for existing in day_sessions {
        if existing.date != date {
            continue;
        }
        if exclude_id == Some(existing.id.as_str()) {
            continue;
        }
        if !overlaps(
            start,
            duration_minutes,
            existing.start_minutes(),
            existing.duration_minutes,
        ) {
            continue;
        }
        let shared_person_ids = shared(person_ids, &existing.person_ids);
        let shared_resource_ids = shared(resource_ids, &existing.resource_ids);
        if shared_person_ids.is_empty() && shared_resource_ids.is_empty() {
            continue;
        }
        return Some(SessionConflict {
            existing_key: existing.key(),
            existing_id: existing.id.clone(),
            existing_window: existing.window(),
            shared_person_ids,
            shared_resource_ids,
        });
    }
    None
}

/// Persons and resources busy in any session overlapping the given slot.
pub fn slot_occupancy(
    day_sessions: &[Session],
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: u32,
    exclude_id: Option<&str>,
) -> (BTreeSet<PersonId>, BTreeSet<ResourceId>) {
    let start = minutes_since_midnight(start_time);
    let mut persons = BTreeSet::new();
    let mut resources = BTreeSet::new();
    for existing in day_sessions {
        if existing.date != date {
            continue;
        }
        if exclude_id == Some(existing.id.as_str()) {
            continue;
        }
        if overlaps(
            start,
            duration_minutes,
            existing.start_minutes(),
            existing.duration_minutes,
        ) {
            persons.extend(existing.person_ids.iter().cloned());
            resources.extend(existing.resource_ids.iter().cloned());
        }
    }
    (persons, resources)
}

/// Scan a merged week for pairwise conflicts between stored sessions.
pub fn week_conflicts(sessions: &[Session]) -> Vec<ScheduleConflict> {
    let mut out = Vec::new();
    for (i, a) in sessions.iter().enumerate() {
        for b in &sessions[i + 1..] {
            if a.date != b.date {
                continue;
            }
            if !overlaps(
                a.start_minutes(),
                a.duration_minutes,
                b.start_minutes(),
                b.duration_minutes,
            ) {
                continue;
            }
            let shared_person_ids = shared(&a.person_ids, &b.person_ids);
            let shared_resource_ids = shared(&a.resource_ids, &b.resource_ids);
            if shared_person_ids.is_empty() && shared_resource_ids.is_empty() {
                continue;
            }
            out.push(ScheduleConflict {
                date: a.date,
                first: ConflictSide::of(a),
                second: ConflictSide::of(b),
                shared_person_ids,
                shared_resource_ids,
            });
        }
    }
    out
}
