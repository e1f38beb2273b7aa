//! Weekly session scheduling: expansion, merging, conflict detection and
//! the planner that ties it all to storage.

pub mod conflict;
pub mod expand;
pub mod merge;
pub mod planner;
pub mod stats;
pub mod time;
pub mod types;

pub use conflict::{find_conflict, week_conflicts, ScheduleConflict, SessionConflict};
pub use expand::{draft_session_id, expand_week};
pub use merge::merge_week;
pub use planner::SchedulePlanner;
pub use stats::{week_stats, WeekStats};
pub use types::{
    CopyOutcome, GenerateOutcome, RecurringTemplate, Session, SessionInput, SessionOrigin,
    SessionPatch, SlotAvailability, TemplateId, WeekEntry, WeekRecord,
};
