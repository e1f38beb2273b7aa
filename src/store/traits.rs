//! Storage abstraction for the scheduling engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::allocation::ResourceAllocation;
use crate::availability::WeekAvailability;
use crate::error::Result;
use crate::roster::{Person, Resource};
use crate::schedule::types::{RecurringTemplate, WeekRecord};

/// A week record together with its optimistic-concurrency version.
///
/// Version 0 is the empty, never-written record; every successful write
/// bumps the version by one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedWeekRecord {
    pub version: u64,
    pub record: WeekRecord,
}

impl Default for VersionedWeekRecord {
    fn default() -> Self {
        Self {
            version: 0,
            record: WeekRecord::default(),
        }
    }
}

/// Backing store for rosters, templates, allocations, availability and
/// week records.
///
/// Week records are written with compare-and-swap so two writers editing the
/// same week cannot silently lose each other's changes; everything else is
/// whole-collection read/write.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All persons, active or not.
    async fn list_persons(&self) -> Result<Vec<Person>>;

    /// All resources, active or not.
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// All recurring templates, active or not.
    async fn list_templates(&self) -> Result<Vec<RecurringTemplate>>;

    /// All allocations.
    async fn get_allocations(&self) -> Result<Vec<ResourceAllocation>>;

    /// Replace the allocation collection.
    async fn save_allocations(&self, allocations: Vec<ResourceAllocation>) -> Result<()>;

    /// The facility-wide weekly availability windows.
    async fn get_availability(&self) -> Result<WeekAvailability>;

    /// Replace the facility-wide weekly availability.
    async fn save_availability(&self, availability: WeekAvailability) -> Result<()>;

    /// The stored record for a week key (`"{iso_year}-{iso_week:02}"`),
    /// or the default empty record at version 0.
    async fn get_week_record(&self, week_key: &str) -> Result<VersionedWeekRecord>;

    /// Write a week record if its stored version still equals
    /// `expected_version`; returns the new version. A stale expectation
    /// fails with [`crate::error::StorageError::VersionConflict`].
    async fn compare_and_swap_week(
        &self,
        week_key: &str,
        expected_version: u64,
        record: WeekRecord,
    ) -> Result<u64>;
}
