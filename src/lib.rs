//! Manege is a weekly scheduling engine for riding schools: recurring
//! session templates, per-week one-off sessions and overrides, automatic
//! resource assignment from rider/horse allocations, availability windows
//! and double-booking detection.
//!
//! The weekly schedule is never stored whole. Recurring templates expand
//! into generated drafts, a per-week record overlays punctual sessions and
//! modification deltas, and [`schedule::merge_week`] derives the
//! authoritative session list on demand. [`SchedulePlanner`] wraps all of it
//! behind validated, conflict-checked operations over a [`ScheduleStore`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use manege::{EmbeddedScheduleStore, SchedulePlanner, SessionInput};
//!
//! # async fn demo() -> manege::Result<()> {
//! let store = Arc::new(EmbeddedScheduleStore::new());
//! let planner = SchedulePlanner::new(Arc::clone(&store));
//!
//! let session = planner
//!     .create_or_update_session(
//!         SessionInput::new("2024-06-11", "18:00", 60).with_persons(["rider-1"]),
//!     )
//!     .await?;
//! println!("booked {}", session.key());
//! # Ok(())
//! # }
//! ```

pub mod allocation;
pub mod availability;
pub mod config;
pub mod error;
pub mod roster;
pub mod schedule;
pub mod store;

pub use allocation::{AllocationManager, ResourceAllocation};
pub use availability::{AvailabilityWindow, WeekAvailability};
pub use config::Config;
pub use error::{ManegeError, Result};
pub use roster::{Person, Resource};
pub use schedule::{
    RecurringTemplate, SchedulePlanner, Session, SessionInput, SessionOrigin, WeekRecord,
};
pub use store::{EmbeddedScheduleStore, ScheduleStore, VersionedWeekRecord};
