//! Expansion of recurring templates into one week's generated drafts.

use chrono::NaiveDate;

use crate::schedule::time::{format_date, week_start, weekday_offset};
use crate::schedule::types::{RecurringTemplate, Session, SessionOrigin};

/// Deterministic id of the draft a template produces on a given date.
pub fn draft_session_id(template_id: &str, date: NaiveDate) -> String {
    format!("rec_{}_{}", template_id, format_date(date))
}

/// Expand every active template into its draft for the week containing
/// `reference_date`.
///
/// Drafts carry no resources; resolution happens when a draft is edited and
/// stored. The result is deterministic: same templates and week in, same
/// drafts out, ordered by (date, start time, template id).
pub fn expand_week(templates: &[RecurringTemplate], reference_date: NaiveDate) -> Vec<Session> {
    let monday = week_start(reference_date);
    let mut drafts: Vec<Session> = templates
        .iter()
        .filter(|t| t.active)
        .map(|t| {
            let date = monday + chrono::Duration::days(weekday_offset(t.weekday) as i64);
            Session {
                id: draft_session_id(&t.id, date),
                date,
                weekday: t.weekday,
                start_time: t.start_time,
                duration_minutes: t.duration_minutes,
                person_ids: t.person_ids.clone(),
                resource_ids: Vec::new(),
                auto_added_resource_ids: Vec::new(),
                instructor: t.instructor.clone(),
                notes: t.notes.clone(),
                session_type: t.session_type.clone(),
                template_id: Some(t.id.clone()),
                color: t.color.clone(),
                origin: SessionOrigin::Generated,
                created_at: t.created_at,
                updated_at: t.updated_at,
            }
        })
        .collect();
    drafts.sort_by(|a, b| {
        (a.date, a.start_time, a.id.as_str()).cmp(&(b.date, b.start_time, b.id.as_str()))
    });
    drafts
}
