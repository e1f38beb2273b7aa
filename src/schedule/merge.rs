//! Merge of generated drafts with a week's stored entries.

use chrono::NaiveDate;
use tracing::debug;

use crate::schedule::expand::expand_week;
use crate::schedule::types::{RecurringTemplate, Session, SessionOrigin, WeekEntry, WeekRecord};

/// Produce the authoritative session list for one week.
///
/// Generated drafts come first, then stored entries are folded in: punctual
/// entries are added as-is, modification entries patch their target draft in
/// place. A modification whose target draft no longer exists (template
/// deleted or deactivated) is dropped. The result is sorted by date, start
/// time and id, and is stable under repeated merging of the same inputs.
pub fn merge_week(
    templates: &[RecurringTemplate],
    reference_date: NaiveDate,
    record: &WeekRecord,
) -> Vec<Session> {
    let mut drafts = expand_week(templates, reference_date);
    let mut punctual: Vec<Session> = Vec::new();

    for (key, entry) in &record.entries {
        match entry {
            WeekEntry::Punctual(session) => {
                let mut session = session.clone();
                session.origin = SessionOrigin::Punctual;
                punctual.push(session);
            }
            WeekEntry::Modification { target, patch } => {
                match drafts.iter_mut().find(|d| d.id == *target) {
                    Some(draft) => {
                        patch.apply_to(draft);
                        draft.origin = SessionOrigin::Modified;
                    }
                    None => {
                        debug!(key = %key, target = %target, "dropping orphaned modification");
                    }
                }
            }
        }
    }

    drafts.extend(punctual);
    drafts.sort_by(|a, b| {
        (a.date, a.start_time, a.id.as_str()).cmp(&(b.date, b.start_time, b.id.as_str()))
    });
    drafts
}
