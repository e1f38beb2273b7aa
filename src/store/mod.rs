//! Storage backends.

pub mod embedded;
pub mod traits;

pub use embedded::EmbeddedScheduleStore;
pub use traits::{ScheduleStore, VersionedWeekRecord};
