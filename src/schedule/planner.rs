//! The planner: week expansion, session upserts, generation, copying and
//! occupancy queries on top of a [`ScheduleStore`].
//!
//! Every mutation follows the same shape: parse and validate the input, load
//! the week record at its current version, rebuild the merged week, run the
//! gates (availability, conflict detection), then write the record back with
//! compare-and-swap. A concurrent writer surfaces as a version conflict
//! instead of a silently lost update.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::allocation::active_resources_for;
use crate::availability::validate_slot;
use crate::config::PlanningConfig;
use crate::error::{EntityKind, ManegeError, Result};
use crate::roster::{PersonId, ResourceId};
use crate::schedule::conflict::{
    find_conflict, slot_occupancy, week_conflicts, ScheduleConflict,
};
use crate::schedule::expand::{draft_session_id, expand_week};
use crate::schedule::merge::merge_week;
use crate::schedule::stats::{week_stats, WeekStats};
use crate::schedule::time::{
    format_date, parse_date, parse_time, session_key, week_key, week_start,
};
use crate::schedule::types::{
    AvailablePerson, CopyOutcome, GenerateOutcome, Session, SessionInput, SessionOrigin,
    SessionPatch, SlotAvailability, WeekEntry,
};
use crate::store::{ScheduleStore, VersionedWeekRecord};

/// Weekly planning engine over a schedule store.
pub struct SchedulePlanner<S: ScheduleStore> {
    store: Arc<S>,
    planning: PlanningConfig,
}

impl<S: ScheduleStore> SchedulePlanner<S> {
    /// Planner with default planning limits.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            planning: PlanningConfig::default(),
        }
    }

    /// Planner with explicit planning limits.
    pub fn with_config(store: Arc<S>, planning: PlanningConfig) -> Self {
        Self { store, planning }
    }

    /// Access the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // Week views
    // ========================================================================

    /// Template drafts for the week containing `date` (`YYYY-MM-DD`),
    /// ignoring any stored entries.
    pub async fn expand_week(&self, date: &str) -> Result<Vec<Session>> {
        let date = parse_date_arg(date)?;
        let templates = self.store.list_templates().await?;
        Ok(expand_week(&templates, date))
    }

    /// The authoritative merged week containing `date`.
    pub async fn merged_week(&self, date: &str) -> Result<Vec<Session>> {
        let date = parse_date_arg(date)?;
        self.merged_week_at(date).await.map(|(sessions, _)| sessions)
    }

    /// Double-bookings within the merged week containing `date`.
    pub async fn list_conflicts(&self, date: &str) -> Result<Vec<ScheduleConflict>> {
        let sessions = self.merged_week(date).await?;
        Ok(week_conflicts(&sessions))
    }

    /// Aggregate statistics for the merged week containing `date`.
    pub async fn week_stats(&self, date: &str) -> Result<WeekStats> {
        let date = parse_date_arg(date)?;
        let (sessions, _) = self.merged_week_at(date).await?;
        Ok(week_stats(week_start(date), &sessions))
    }

    async fn merged_week_at(&self, date: NaiveDate) -> Result<(Vec<Session>, VersionedWeekRecord)> {
        let templates = self.store.list_templates().await?;
        let versioned = self.store.get_week_record(&week_key(date)).await?;
        let sessions = merge_week(&templates, date, &versioned.record);
        Ok((sessions, versioned))
    }

    // ========================================================================
    // Session upsert
    // ========================================================================

    /// Create a punctual session, or override a template draft for its week.
    ///
    /// Validates the slot against the facility availability windows, resolves
    /// resources from allocations, and rejects double-bookings before writing
    /// anything.
    pub async fn create_or_update_session(&self, input: SessionInput) -> Result<Session> {
        let date = parse_date_arg(&input.date)?;
        let start_time = parse_time_arg(&input.start_time)?;
        self.validate_duration(input.duration_minutes)?;
        if input.person_ids.is_empty() {
            return Err(ManegeError::Validation(
                "a session requires at least one person".to_string(),
            ));
        }

        // A template override must target a live template on its weekday.
        if let Some(template_id) = &input.template_id {
            let templates = self.store.list_templates().await?;
            let template = templates
                .iter()
                .find(|t| t.id == *template_id)
                .ok_or_else(|| ManegeError::NotFound {
                    kind: EntityKind::Template,
                    id: template_id.clone(),
                })?;
            if !template.active {
                return Err(ManegeError::Validation(format!(
                    "template {template_id} is deactivated and no longer expands"
                )));
            }
            if template.weekday != date.weekday() {
                return Err(ManegeError::Validation(format!(
                    "date {} does not fall on the template's weekday",
                    input.date
                )));
            }
        }

        self.check_roster(&input.person_ids, &input.resource_ids, date).await?;

        let availability = self.store.get_availability().await?;
        validate_slot(&availability, date.weekday(), start_time, input.duration_minutes)?;

        let (resource_ids, auto_added) = self
            .resolve_resources(&input.person_ids, &input.resource_ids, date)
            .await?;

        let entry_key = match &input.template_id {
            Some(template_id) => draft_session_id(template_id, date),
            None => session_key(date, start_time),
        };

        let (sessions, versioned) = self.merged_week_at(date).await?;
        // Exclude only the session actually being edited: the draft for a
        // template override, or the stored punctual session replaced at this
        // slot. Anything else occupying the same time is a real collision.
        let exclude = match &input.template_id {
            Some(_) => Some(entry_key.clone()),
            None => match versioned.record.get(&entry_key) {
                Some(WeekEntry::Punctual(existing)) => Some(existing.id.clone()),
                _ => None,
            },
        };
        let day_sessions: Vec<Session> =
            sessions.into_iter().filter(|s| s.date == date).collect();
        if let Some(conflict) = find_conflict(
            &day_sessions,
            date,
            start_time,
            input.duration_minutes,
            &input.person_ids,
            &resource_ids,
            exclude.as_deref(),
        ) {
            return Err(conflict.into());
        }

        let now = Utc::now();
        let session_type = if input.session_type.is_empty() {
            self.planning.default_session_type.clone()
        } else {
            input.session_type.clone()
        };

        let mut record = versioned.record.clone();
        let session = match &input.template_id {
            Some(template_id) => {
                // Keep the first-written timestamp across repeated edits.
                let created_at = match record.get(&entry_key) {
                    Some(WeekEntry::Modification { patch, .. }) => {
                        patch.created_at.unwrap_or(now)
                    }
                    _ => now,
                };
                let patch = SessionPatch {
                    start_time: Some(start_time),
                    duration_minutes: Some(input.duration_minutes),
                    person_ids: Some(input.person_ids.clone()),
                    resource_ids: Some(resource_ids.clone()),
                    auto_added_resource_ids: Some(auto_added.clone()),
                    instructor: Some(input.instructor.clone()),
                    notes: Some(input.notes.clone()),
                    session_type: Some(session_type.clone()),
                    color: input.color.clone(),
                    created_at: Some(created_at),
                    updated_at: Some(now),
                };
                record.insert_modification(entry_key.clone(), patch);
                Session {
                    id: entry_key.clone(),
                    date,
                    weekday: date.weekday(),
                    start_time,
                    duration_minutes: input.duration_minutes,
                    person_ids: input.person_ids,
                    resource_ids,
                    auto_added_resource_ids: auto_added,
                    instructor: input.instructor,
                    notes: input.notes,
                    session_type,
                    template_id: Some(template_id.clone()),
                    color: input.color,
                    origin: SessionOrigin::Modified,
                    created_at,
                    updated_at: now,
                }
            }
            None => {
                // Editing an existing punctual slot keeps its identity.
                let (id, created_at) = match record.get(&entry_key) {
                    Some(WeekEntry::Punctual(existing)) => {
                        (existing.id.clone(), existing.created_at)
                    }
                    _ => (uuid::Uuid::new_v4().to_string(), now),
                };
                let session = Session {
                    id,
                    date,
                    weekday: date.weekday(),
                    start_time,
                    duration_minutes: input.duration_minutes,
                    person_ids: input.person_ids,
                    resource_ids,
                    auto_added_resource_ids: auto_added,
                    instructor: input.instructor,
                    notes: input.notes,
                    session_type,
                    template_id: None,
                    color: input.color,
                    origin: SessionOrigin::Punctual,
                    created_at,
                    updated_at: now,
                };
                record.insert_punctual(session.clone());
                session
            }
        };

        self.store
            .compare_and_swap_week(&week_key(date), versioned.version, record)
            .await?;
        info!(key = %entry_key, date = %format_date(date), "stored session");
        Ok(session)
    }

    /// Delete the stored session at a slot.
    ///
    /// Deleting a modified draft removes the modification, reverting the slot
    /// to its generated form. A purely generated draft has nothing stored and
    /// cannot be deleted.
    pub async fn delete_session(&self, date: &str, start_time: &str) -> Result<()> {
        let date = parse_date_arg(date)?;
        let start_time = parse_time_arg(start_time)?;
        let key = session_key(date, start_time);

        let (sessions, versioned) = self.merged_week_at(date).await?;
        let mut record = versioned.record.clone();

        let removed_key = if record.get(&key).is_some() {
            record.remove(&key);
            key.clone()
        } else {
            // A modified draft is stored under its draft id, not its slot key.
            let modified = sessions.iter().find(|s| {
                s.date == date
                    && s.start_time == start_time
                    && s.origin == SessionOrigin::Modified
            });
            match modified {
                Some(session) if record.get(&session.id).is_some() => {
                    let id = session.id.clone();
                    record.remove(&id);
                    id
                }
                _ => {
                    return Err(ManegeError::NotFound {
                        kind: EntityKind::Session,
                        id: key,
                    })
                }
            }
        };

        self.store
            .compare_and_swap_week(&week_key(date), versioned.version, record)
            .await?;
        info!(key = %removed_key, "deleted session entry");
        Ok(())
    }

    // ========================================================================
    // Occupancy
    // ========================================================================

    /// Who and what is free at a candidate slot.
    ///
    /// `exclude_id` skips the session being edited, matched by its id.
    pub async fn check_availability_at(
        &self,
        date: &str,
        start_time: &str,
        duration_minutes: u32,
        exclude_id: Option<&str>,
    ) -> Result<SlotAvailability> {
        let date = parse_date_arg(date)?;
        let start_time = parse_time_arg(start_time)?;
        self.validate_duration(duration_minutes)?;

        let (sessions, _) = self.merged_week_at(date).await?;
        let day_sessions: Vec<Session> =
            sessions.into_iter().filter(|s| s.date == date).collect();
        let (occupied_persons, occupied_resources) =
            slot_occupancy(&day_sessions, date, start_time, duration_minutes, exclude_id);

        let allocations = self.store.get_allocations().await?;
        let available_persons = self
            .store
            .list_persons()
            .await?
            .into_iter()
            .filter(|p| p.is_active_on(date) && !occupied_persons.contains(&p.id))
            .map(|p| {
                let allocated = active_resources_for(&allocations, &p.id, date)
                    .into_iter()
                    .filter(|r| !occupied_resources.contains(r))
                    .collect();
                AvailablePerson {
                    person_id: p.id,
                    name: p.name,
                    allocated_resource_ids: allocated,
                }
            })
            .collect();

        let available_resource_ids = self
            .store
            .list_resources()
            .await?
            .into_iter()
            .filter(|r| r.is_active_on(date) && !occupied_resources.contains(&r.id))
            .map(|r| r.id)
            .collect();

        Ok(SlotAvailability {
            date,
            start_time,
            duration_minutes,
            occupied_person_ids: occupied_persons.into_iter().collect(),
            occupied_resource_ids: occupied_resources.into_iter().collect(),
            available_persons,
            available_resource_ids,
        })
    }

    // ========================================================================
    // Week generation and copying
    // ========================================================================

    /// Materialize every active template's draft into the stored week,
    /// running the full per-candidate gate: roster, availability, resource
    /// resolution and conflict detection.
    ///
    /// Existing entries for a draft are kept unless `overwrite` is set.
    /// Per-candidate failures are collected; the batch keeps going.
    pub async fn generate_week(&self, date: &str, overwrite: bool) -> Result<GenerateOutcome> {
        let date = parse_date_arg(date)?;
        let monday = week_start(date);
        let templates = self.store.list_templates().await?;
        if !templates.iter().any(|t| t.active) {
            return Err(ManegeError::Validation(
                "no active templates to generate from".to_string(),
            ));
        }

        let versioned = self.store.get_week_record(&week_key(date)).await?;
        let mut record = versioned.record.clone();
        let availability = self.store.get_availability().await?;
        let mut outcome = GenerateOutcome {
            week_start: format_date(monday),
            ..Default::default()
        };

        let drafts = expand_week(&templates, monday);
        let regenerate: BTreeSet<String> = drafts
            .iter()
            .filter(|d| overwrite || record.get(&d.id).is_none())
            .map(|d| d.id.clone())
            .collect();

        // Conflict-check each candidate against everything already standing
        // in the merged week, minus the drafts being regenerated, growing
        // the baseline as candidates are accepted.
        let mut accepted: Vec<Session> = merge_week(&templates, monday, &record)
            .into_iter()
            .filter(|s| !regenerate.contains(s.id.as_str()))
            .collect();

        for draft in drafts {
            if !regenerate.contains(draft.id.as_str()) {
                outcome.skipped += 1;
                continue;
            }
            if let Err(err) = self.check_roster(&draft.person_ids, &[], draft.date).await {
                outcome.errors.push(format!("{}: {err}", draft.id));
                continue;
            }
            if let Err(err) = validate_slot(
                &availability,
                draft.weekday,
                draft.start_time,
                draft.duration_minutes,
            ) {
                outcome.errors.push(format!("{}: {err}", draft.id));
                continue;
            }
            let (resource_ids, auto_added) = match self
                .resolve_resources(&draft.person_ids, &[], draft.date)
                .await
            {
                Ok(resolved) => resolved,
                Err(err) => {
                    outcome.errors.push(format!("{}: {err}", draft.id));
                    continue;
                }
            };
            if let Some(conflict) = find_conflict(
                &accepted,
                draft.date,
                draft.start_time,
                draft.duration_minutes,
                &draft.person_ids,
                &resource_ids,
                None,
            ) {
                outcome.errors.push(format!("{}: {conflict}", draft.id));
                continue;
            }

            let now = Utc::now();
            let patch = SessionPatch {
                resource_ids: Some(resource_ids.clone()),
                auto_added_resource_ids: Some(auto_added.clone()),
                created_at: Some(now),
                updated_at: Some(now),
                ..Default::default()
            };
            record.insert_modification(draft.id.clone(), patch);

            let mut materialized = draft;
            materialized.resource_ids = resource_ids;
            materialized.auto_added_resource_ids = auto_added;
            accepted.push(materialized);
            outcome.created += 1;
        }

        self.store
            .compare_and_swap_week(&week_key(date), versioned.version, record)
            .await?;
        info!(
            week = %outcome.week_start,
            created = outcome.created,
            skipped = outcome.skipped,
            errors = outcome.errors.len(),
            "generated week"
        );
        Ok(outcome)
    }

    /// Copy one week's stored entries onto another week, shifted day-by-day.
    ///
    /// Punctual sessions get fresh ids and timestamps; modification entries
    /// are re-targeted at the destination week's drafts. Existing destination
    /// entries are kept unless `overwrite` is set.
    pub async fn copy_week(&self, from: &str, to: &str, overwrite: bool) -> Result<CopyOutcome> {
        let from_monday = week_start(parse_date_arg(from)?);
        let to_monday = week_start(parse_date_arg(to)?);
        if from_monday == to_monday {
            return Err(ManegeError::Validation(
                "source and destination weeks are identical".to_string(),
            ));
        }

        let source = self.store.get_week_record(&week_key(from_monday)).await?;
        if source.record.is_empty() {
            return Err(ManegeError::Validation(format!(
                "week {} has nothing to copy",
                format_date(from_monday)
            )));
        }

        let destination = self.store.get_week_record(&week_key(to_monday)).await?;
        let mut record = destination.record.clone();
        let offset = to_monday - from_monday;
        let mut outcome = CopyOutcome {
            from_week: format_date(from_monday),
            to_week: format_date(to_monday),
            ..Default::default()
        };

        for (key, entry) in &source.record.entries {
            match entry {
                WeekEntry::Punctual(session) => {
                    let mut copy = session.clone();
                    copy.date = session.date + offset;
                    copy.weekday = copy.date.weekday();
                    copy.id = uuid::Uuid::new_v4().to_string();
                    let now = Utc::now();
                    copy.created_at = now;
                    copy.updated_at = now;
                    let new_key = copy.key();
                    if record.get(&new_key).is_some() && !overwrite {
                        outcome.skipped += 1;
                        continue;
                    }
                    record.insert_punctual(copy);
                    outcome.copied += 1;
                }
                WeekEntry::Modification { target, patch } => {
                    let Some(new_target) = shift_draft_id(target, offset) else {
                        outcome
                            .errors
                            .push(format!("{key}: unparseable modification target"));
                        continue;
                    };
                    if record.get(&new_target).is_some() && !overwrite {
                        outcome.skipped += 1;
                        continue;
                    }
                    let mut patch = patch.clone();
                    patch.updated_at = Some(Utc::now());
                    record.insert_modification(new_target, patch);
                    outcome.copied += 1;
                }
            }
        }

        self.store
            .compare_and_swap_week(&week_key(to_monday), destination.version, record)
            .await?;
        info!(
            from = %outcome.from_week,
            to = %outcome.to_week,
            copied = outcome.copied,
            skipped = outcome.skipped,
            "copied week"
        );
        Ok(outcome)
    }

    // ========================================================================
    // Validation helpers
    // ========================================================================

    fn validate_duration(&self, duration_minutes: u32) -> Result<()> {
        let max = self.planning.max_session_minutes;
        if duration_minutes == 0 || duration_minutes > max {
            return Err(ManegeError::Validation(format!(
                "duration must be within 1..={max} minutes, got {duration_minutes}"
            )));
        }
        Ok(())
    }

    async fn check_roster(
        &self,
        person_ids: &[PersonId],
        resource_ids: &[ResourceId],
        date: NaiveDate,
    ) -> Result<()> {
        let persons = self.store.list_persons().await?;
        for id in person_ids {
            let person = persons
                .iter()
                .find(|p| p.id == *id)
                .ok_or_else(|| ManegeError::NotFound {
                    kind: EntityKind::Person,
                    id: id.clone(),
                })?;
            if !person.is_active_on(date) {
                return Err(ManegeError::Validation(format!(
                    "person {} is not active on {}",
                    person.name,
                    format_date(date)
                )));
            }
        }
        let resources = self.store.list_resources().await?;
        for id in resource_ids {
            let resource = resources
                .iter()
                .find(|r| r.id == *id)
                .ok_or_else(|| ManegeError::NotFound {
                    kind: EntityKind::Resource,
                    id: id.clone(),
                })?;
            if !resource.is_active_on(date) {
                return Err(ManegeError::Validation(format!(
                    "resource {} is not active on {}",
                    resource.name,
                    format_date(date)
                )));
            }
        }
        Ok(())
    }

    /// Explicit resources first, then allocation-resolved ones, deduplicated.
    async fn resolve_resources(
        &self,
        person_ids: &[PersonId],
        explicit: &[ResourceId],
        date: NaiveDate,
    ) -> Result<(Vec<ResourceId>, Vec<ResourceId>)> {
        let allocations = self.store.get_allocations().await?;
        let mut resource_ids: Vec<ResourceId> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for id in explicit {
            if seen.insert(id.as_str()) {
                resource_ids.push(id.clone());
            }
        }
        let mut auto_added = Vec::new();
        for person_id in person_ids {
            for resource_id in active_resources_for(&allocations, person_id, date) {
                if !resource_ids.contains(&resource_id) && !auto_added.contains(&resource_id) {
                    debug!(person_id = %person_id, resource_id = %resource_id, "auto-assigning resource");
                    auto_added.push(resource_id);
                }
            }
        }
        resource_ids.extend(auto_added.iter().cloned());
        Ok((resource_ids, auto_added))
    }
}

/// Shift a draft id (`rec_{template}_{date}`) by a whole number of days.
fn shift_draft_id(draft_id: &str, offset: chrono::Duration) -> Option<String> {
    let rest = draft_id.strip_prefix("rec_")?;
    let (template_id, date) = rest.rsplit_once('_')?;
    let date = parse_date(date)?;
    Some(draft_session_id(template_id, date + offset))
}

fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    parse_date(s).ok_or_else(|| ManegeError::Validation(format!("invalid date: {s:?}")))
}

fn parse_time_arg(s: &str) -> Result<NaiveTime> {
    parse_time(s).ok_or_else(|| ManegeError::Validation(format!("invalid time: {s:?}")))
}
