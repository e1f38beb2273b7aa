//! Core scheduling types: sessions, recurring templates and the persisted
//! week record.
//!
//! A week record never stores the merged session list. It stores punctual
//! sessions and modification deltas; the authoritative list is always derived
//! by [`crate::schedule::merge::merge_week`].

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::roster::{PersonId, ResourceId};
use crate::schedule::time::{format_time, minutes_since_midnight, session_key};

/// Identifier of a recurring template.
pub type TemplateId = String;

fn default_true() -> bool {
    true
}

fn default_session_type() -> String {
    "lesson".to_string()
}

// ============================================================================
// Session
// ============================================================================

/// Where a merged session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Expanded from a recurring template, nothing stored for it.
    Generated,
    /// A stored one-off session with no backing template.
    Punctual,
    /// A template draft overridden by a stored modification delta.
    Modified,
}

/// One concrete, date-stamped session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Draft id for generated/modified sessions, own id for punctual ones.
    pub id: String,
    /// Calendar date of the session.
    pub date: NaiveDate,
    /// Weekday, always derived from `date`.
    pub weekday: Weekday,
    /// Start of the session.
    pub start_time: NaiveTime,
    /// Length in minutes, within `1..=480`.
    pub duration_minutes: u32,
    /// Participating persons.
    pub person_ids: Vec<PersonId>,
    /// Resources in use: explicit ids first, then auto-resolved ones.
    #[serde(default)]
    pub resource_ids: Vec<ResourceId>,
    /// Subset of `resource_ids` that was auto-resolved from allocations.
    #[serde(default)]
    pub auto_added_resource_ids: Vec<ResourceId>,
    /// Instructor name.
    #[serde(default)]
    pub instructor: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Session category ("lesson", "training", ...).
    #[serde(default = "default_session_type")]
    pub session_type: String,
    /// Backing template, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Display color inherited from the template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// How this session entered the merged set.
    pub origin: SessionOrigin,
    /// When the stored entry was first created.
    pub created_at: DateTime<Utc>,
    /// When the stored entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a punctual session with a fresh id.
    pub fn new(date: NaiveDate, start_time: NaiveTime, duration_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            weekday: date.weekday(),
            start_time,
            duration_minutes,
            person_ids: Vec::new(),
            resource_ids: Vec::new(),
            auto_added_resource_ids: Vec::new(),
            instructor: String::new(),
            notes: String::new(),
            session_type: default_session_type(),
            template_id: None,
            color: None,
            origin: SessionOrigin::Punctual,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the participating persons.
    pub fn with_persons(mut self, person_ids: impl IntoIterator<Item = impl Into<PersonId>>) -> Self {
        self.person_ids = person_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resources in use.
    pub fn with_resources(
        mut self,
        resource_ids: impl IntoIterator<Item = impl Into<ResourceId>>,
    ) -> Self {
        self.resource_ids = resource_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the instructor.
    pub fn with_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = instructor.into();
        self
    }

    /// Set the session category.
    pub fn with_type(mut self, session_type: impl Into<String>) -> Self {
        self.session_type = session_type.into();
        self
    }

    /// Set the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// End of the session, always derived from start and duration.
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// Start of the session in minutes since midnight.
    pub fn start_minutes(&self) -> u32 {
        minutes_since_midnight(self.start_time)
    }

    /// Slot key (`"{date}|{HH:MM}"`) identifying this session's slot.
    pub fn key(&self) -> String {
        session_key(self.date, self.start_time)
    }

    /// Human-readable time window, e.g. `10:00-11:00`.
    pub fn window(&self) -> String {
        format!("{}-{}", format_time(self.start_time), format_time(self.end_time()))
    }
}

// ============================================================================
// Recurring templates
// ============================================================================

/// A weekly-recurring session blueprint.
///
/// Templates are owned by an external management layer and are soft-deactivated
/// rather than deleted while generated sessions may still reference them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// Unique identifier.
    pub id: TemplateId,
    /// Weekday the template recurs on.
    pub weekday: Weekday,
    /// Start of the generated sessions.
    pub start_time: NaiveTime,
    /// Length in minutes, within `1..=480`.
    pub duration_minutes: u32,
    /// Participating persons.
    #[serde(default)]
    pub person_ids: Vec<PersonId>,
    /// Instructor name.
    #[serde(default)]
    pub instructor: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Session category.
    #[serde(default = "default_session_type")]
    pub session_type: String,
    /// Display color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Inactive templates are skipped by the expander.
    #[serde(default = "default_true")]
    pub active: bool,
    /// When the template was created.
    pub created_at: DateTime<Utc>,
    /// When the template was last edited.
    pub updated_at: DateTime<Utc>,
}

impl RecurringTemplate {
    /// Create an active template with a fresh id.
    pub fn new(weekday: Weekday, start_time: NaiveTime, duration_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            weekday,
            start_time,
            duration_minutes,
            person_ids: Vec::new(),
            instructor: String::new(),
            notes: String::new(),
            session_type: default_session_type(),
            color: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the participating persons.
    pub fn with_persons(mut self, person_ids: impl IntoIterator<Item = impl Into<PersonId>>) -> Self {
        self.person_ids = person_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the instructor.
    pub fn with_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = instructor.into();
        self
    }

    /// Set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

// ============================================================================
// Week record
// ============================================================================

/// Partial override of a template-generated session for one week.
///
/// Fields present in the patch win over the generated draft; absent fields
/// leave the draft untouched. Applying the same patch twice yields the same
/// session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_ids: Option<Vec<PersonId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_ids: Option<Vec<ResourceId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_added_resource_ids: Option<Vec<ResourceId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    /// Apply this patch to a generated draft.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(start_time) = self.start_time {
            session.start_time = start_time;
        }
        if let Some(duration) = self.duration_minutes {
            session.duration_minutes = duration;
        }
        if let Some(ref person_ids) = self.person_ids {
            session.person_ids = person_ids.clone();
        }
        if let Some(ref resource_ids) = self.resource_ids {
            session.resource_ids = resource_ids.clone();
        }
        if let Some(ref auto) = self.auto_added_resource_ids {
            session.auto_added_resource_ids = auto.clone();
        }
        if let Some(ref instructor) = self.instructor {
            session.instructor = instructor.clone();
        }
        if let Some(ref notes) = self.notes {
            session.notes = notes.clone();
        }
        if let Some(ref session_type) = self.session_type {
            session.session_type = session_type.clone();
        }
        if let Some(ref color) = self.color {
            session.color = Some(color.clone());
        }
        if let Some(created_at) = self.created_at {
            session.created_at = created_at;
        }
        if let Some(updated_at) = self.updated_at {
            session.updated_at = updated_at;
        }
    }
}

/// A stored entry in a week record.
///
/// The variant tag is the single source of truth for dispatch; entry keys are
/// never parsed to decide what an entry is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeekEntry {
    /// A fully-specified one-off session, keyed by its slot key.
    Punctual(Session),
    /// A delta over a template draft, keyed by the target draft id.
    Modification {
        /// Draft id (`rec_{template}_{date}`) the patch applies to.
        target: String,
        /// Fields overriding the generated draft.
        patch: SessionPatch,
    },
}

/// The persisted representation of one week's schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekRecord {
    /// Entry key to stored entry. Punctual entries are keyed by slot key,
    /// modifications by their target draft id.
    #[serde(default)]
    pub entries: BTreeMap<String, WeekEntry>,
}

impl WeekRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored for the week.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a punctual session under its slot key.
    pub fn insert_punctual(&mut self, session: Session) {
        self.entries
            .insert(session.key(), WeekEntry::Punctual(session));
    }

    /// Store a modification delta under its target draft id.
    pub fn insert_modification(&mut self, target: impl Into<String>, patch: SessionPatch) {
        let target = target.into();
        self.entries
            .insert(target.clone(), WeekEntry::Modification { target, patch });
    }

    /// Remove an entry by key, returning it.
    pub fn remove(&mut self, key: &str) -> Option<WeekEntry> {
        self.entries.remove(key)
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&WeekEntry> {
        self.entries.get(key)
    }
}

// ============================================================================
// Operation inputs and outcomes
// ============================================================================

/// Caller-supplied fields for creating or updating a session.
///
/// Date and time arrive as strings (`YYYY-MM-DD`, `HH:MM`) and are validated
/// by the planner before anything else happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    /// Session date, `YYYY-MM-DD`.
    pub date: String,
    /// Start time, `HH:MM`.
    pub start_time: String,
    /// Length in minutes, within `1..=480`.
    pub duration_minutes: u32,
    /// Participating persons; at least one is required.
    pub person_ids: Vec<PersonId>,
    /// Explicit resources; auto-resolved ones are appended.
    #[serde(default)]
    pub resource_ids: Vec<ResourceId>,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_session_type")]
    pub session_type: String,
    /// Present when the session overrides a recurring template for the week.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SessionInput {
    /// Minimal input for a punctual session.
    pub fn new(date: impl Into<String>, start_time: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            date: date.into(),
            start_time: start_time.into(),
            duration_minutes,
            person_ids: Vec::new(),
            resource_ids: Vec::new(),
            instructor: String::new(),
            notes: String::new(),
            session_type: default_session_type(),
            template_id: None,
            color: None,
        }
    }

    /// Set the participating persons.
    pub fn with_persons(mut self, person_ids: impl IntoIterator<Item = impl Into<PersonId>>) -> Self {
        self.person_ids = person_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the explicit resources.
    pub fn with_resources(
        mut self,
        resource_ids: impl IntoIterator<Item = impl Into<ResourceId>>,
    ) -> Self {
        self.resource_ids = resource_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Tie the input to a recurring template.
    pub fn for_template(mut self, template_id: impl Into<TemplateId>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

/// Outcome of generating a week from its templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOutcome {
    /// Week start the generation ran for.
    pub week_start: String,
    /// Sessions materialized into the record.
    pub created: usize,
    /// Candidates skipped because an entry already existed.
    pub skipped: usize,
    /// Per-candidate failures; the batch keeps going past them.
    pub errors: Vec<String>,
}

/// Outcome of copying one week's record onto another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyOutcome {
    /// Source week start.
    pub from_week: String,
    /// Destination week start.
    pub to_week: String,
    /// Entries copied into the destination.
    pub copied: usize,
    /// Entries skipped because the destination slot was taken.
    pub skipped: usize,
    /// Per-entry failures; the batch keeps going past them.
    pub errors: Vec<String>,
}

/// Occupancy report for a candidate timeslot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    /// Persons busy in an overlapping session.
    pub occupied_person_ids: Vec<PersonId>,
    /// Resources busy in an overlapping session.
    pub occupied_resource_ids: Vec<ResourceId>,
    /// Active persons free at the slot, with their usable allocations.
    pub available_persons: Vec<AvailablePerson>,
    /// Active resources free at the slot.
    pub available_resource_ids: Vec<ResourceId>,
}

/// A free person together with the allocated resources still free at the slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailablePerson {
    pub person_id: PersonId,
    pub name: String,
    /// Allocated resources resolvable on the date, minus occupied ones.
    pub allocated_resource_ids: Vec<ResourceId>,
}
