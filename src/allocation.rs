//! Person/resource allocations and the resolver that turns them into
//! per-date resource assignments.
//!
//! Allocation date ranges are inclusive at both ends: an allocation ending
//! on a date and another starting on that same date for the same pair do
//! overlap. This is deliberately different from session slot overlap, which
//! is half-open.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EntityKind, ManegeError, Result};
use crate::roster::{today, PersonId, Resource, ResourceId};
use crate::store::ScheduleStore;

/// Identifier of an allocation.
pub type AllocationId = String;

/// A standing assignment of a resource to a person over a date range.
///
/// An open `start_date` means "since forever", an open `end_date` means
/// "until further notice".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Unique identifier.
    pub id: AllocationId,
    /// Person the resource is allocated to.
    pub person_id: PersonId,
    /// Allocated resource.
    pub resource_id: ResourceId,
    /// First day of the allocation, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the allocation, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Contracted riding hours per week, within `(0, 168]`.
    pub hours_per_week: f32,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// When the allocation was created.
    pub created_at: DateTime<Utc>,
    /// When the allocation was last edited.
    pub updated_at: DateTime<Utc>,
}

impl ResourceAllocation {
    /// Create an allocation starting on `start_date`, open-ended.
    pub fn new(
        person_id: impl Into<PersonId>,
        resource_id: impl Into<ResourceId>,
        start_date: NaiveDate,
        hours_per_week: f32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            person_id: person_id.into(),
            resource_id: resource_id.into(),
            start_date: Some(start_date),
            end_date: None,
            hours_per_week,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Close the allocation on `end_date` (inclusive).
    pub fn with_end(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Open the start: the allocation has always been in effect.
    pub fn since_forever(mut self) -> Self {
        self.start_date = None;
        self
    }

    /// Set the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Effective date range with open ends widened to the calendar limits.
    fn effective_range(&self) -> (NaiveDate, NaiveDate) {
        (
            self.start_date.unwrap_or(NaiveDate::MIN),
            self.end_date.unwrap_or(NaiveDate::MAX),
        )
    }

    /// True when the allocation covers `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        let (start, end) = self.effective_range();
        start <= date && date <= end
    }

    /// True when the two allocations' date ranges intersect, both ends
    /// inclusive.
    pub fn dates_overlap(&self, other: &ResourceAllocation) -> bool {
        let (a_start, a_end) = self.effective_range();
        let (b_start, b_end) = other.effective_range();
        a_start <= b_end && b_start <= a_end
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resource ids allocated to `person_id` and active on `date`, deduplicated
/// in first-seen order.
pub fn active_resources_for(
    allocations: &[ResourceAllocation],
    person_id: &str,
    date: NaiveDate,
) -> Vec<ResourceId> {
    let mut out: Vec<ResourceId> = Vec::new();
    for alloc in allocations {
        if alloc.person_id == person_id
            && alloc.is_active_on(date)
            && !out.contains(&alloc.resource_id)
        {
            out.push(alloc.resource_id.clone());
        }
    }
    out
}

/// Find an existing allocation for the same (person, resource) pair whose
/// date range intersects the candidate's.
///
/// `exclude_id` lets an update ignore the allocation being edited.
pub fn find_overlap<'a>(
    allocations: &'a [ResourceAllocation],
    candidate: &ResourceAllocation,
    exclude_id: Option<&str>,
) -> Option<&'a ResourceAllocation> {
    allocations.iter().find(|existing| {
        Some(existing.id.as_str()) != exclude_id
            && existing.person_id == candidate.person_id
            && existing.resource_id == candidate.resource_id
            && existing.dates_overlap(candidate)
    })
}

/// Resources a person may ride on `date`: resources they own, resources
/// allocated to them, and house-owned resources.
pub fn resources_available_to(
    resources: &[Resource],
    allocations: &[ResourceAllocation],
    person_id: &str,
    date: NaiveDate,
) -> Vec<ResourceId> {
    let allocated = active_resources_for(allocations, person_id, date);
    resources
        .iter()
        .filter(|r| r.is_active_on(date))
        .filter(|r| {
            r.owner_person_id.as_deref() == Some(person_id)
                || r.house_owned
                || allocated.contains(&r.id)
        })
        .map(|r| r.id.clone())
        .collect()
}

// ============================================================================
// Manager
// ============================================================================

/// CRUD surface over allocations, backed by a [`ScheduleStore`].
pub struct AllocationManager<S: ScheduleStore> {
    store: Arc<S>,
}

impl<S: ScheduleStore> AllocationManager<S> {
    /// Create a manager over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All allocations.
    pub async fn list(&self) -> Result<Vec<ResourceAllocation>> {
        self.store.get_allocations().await
    }

    /// Allocations active on `date`.
    pub async fn list_active_on(&self, date: NaiveDate) -> Result<Vec<ResourceAllocation>> {
        Ok(self
            .store
            .get_allocations()
            .await?
            .into_iter()
            .filter(|a| a.is_active_on(date))
            .collect())
    }

    /// Allocations involving `person_id`.
    pub async fn for_person(&self, person_id: &str) -> Result<Vec<ResourceAllocation>> {
        Ok(self
            .store
            .get_allocations()
            .await?
            .into_iter()
            .filter(|a| a.person_id == person_id)
            .collect())
    }

    /// Allocations involving `resource_id`.
    pub async fn for_resource(&self, resource_id: &str) -> Result<Vec<ResourceAllocation>> {
        Ok(self
            .store
            .get_allocations()
            .await?
            .into_iter()
            .filter(|a| a.resource_id == resource_id)
            .collect())
    }

    /// Sum of `hours_per_week` across the person's allocations active today.
    pub async fn total_hours_for_person(&self, person_id: &str) -> Result<f32> {
        let date = today();
        Ok(self
            .store
            .get_allocations()
            .await?
            .iter()
            .filter(|a| a.person_id == person_id && a.is_active_on(date))
            .map(|a| a.hours_per_week)
            .sum())
    }

    /// Validate and persist a new allocation.
    ///
    /// An open `start_date` is accepted and means "since forever"; the
    /// overlap guard treats it as reaching indefinitely back.
    pub async fn create(&self, allocation: ResourceAllocation) -> Result<ResourceAllocation> {
        self.validate(&allocation).await?;

        let mut allocations = self.store.get_allocations().await?;
        if let Some(existing) = find_overlap(&allocations, &allocation, None) {
            return Err(ManegeError::AllocationOverlap {
                allocation_id: existing.id.clone(),
                person_id: allocation.person_id,
                resource_id: allocation.resource_id,
            });
        }

        debug!(
            allocation_id = %allocation.id,
            person_id = %allocation.person_id,
            resource_id = %allocation.resource_id,
            "creating allocation"
        );
        allocations.push(allocation.clone());
        self.store.save_allocations(allocations).await?;
        Ok(allocation)
    }

    /// Validate and persist changes to an existing allocation.
    pub async fn update(&self, allocation: ResourceAllocation) -> Result<ResourceAllocation> {
        self.validate(&allocation).await?;

        let mut allocations = self.store.get_allocations().await?;
        let position = allocations
            .iter()
            .position(|a| a.id == allocation.id)
            .ok_or_else(|| ManegeError::NotFound {
                kind: EntityKind::Allocation,
                id: allocation.id.clone(),
            })?;
        if let Some(existing) = find_overlap(&allocations, &allocation, Some(&allocation.id)) {
            return Err(ManegeError::AllocationOverlap {
                allocation_id: existing.id.clone(),
                person_id: allocation.person_id,
                resource_id: allocation.resource_id,
            });
        }

        let mut updated = allocation;
        updated.updated_at = Utc::now();
        allocations[position] = updated.clone();
        self.store.save_allocations(allocations).await?;
        Ok(updated)
    }

    /// Remove an allocation.
    pub async fn delete(&self, allocation_id: &str) -> Result<()> {
        let mut allocations = self.store.get_allocations().await?;
        let before = allocations.len();
        allocations.retain(|a| a.id != allocation_id);
        if allocations.len() == before {
            return Err(ManegeError::NotFound {
                kind: EntityKind::Allocation,
                id: allocation_id.to_string(),
            });
        }
        self.store.save_allocations(allocations).await?;
        Ok(())
    }

    async fn validate(&self, allocation: &ResourceAllocation) -> Result<()> {
        if !(allocation.hours_per_week > 0.0 && allocation.hours_per_week <= 168.0) {
            return Err(ManegeError::Validation(format!(
                "hours_per_week must be within (0, 168], got {}",
                allocation.hours_per_week
            )));
        }
        if let (Some(start), Some(end)) = (allocation.start_date, allocation.end_date) {
            if end < start {
                return Err(ManegeError::Validation(format!(
                    "allocation end date {end} precedes start date {start}"
                )));
            }
        }
        let persons = self.store.list_persons().await?;
        if !persons.iter().any(|p| p.id == allocation.person_id) {
            return Err(ManegeError::NotFound {
                kind: EntityKind::Person,
                id: allocation.person_id.clone(),
            });
        }
        let resources = self.store.list_resources().await?;
        if !resources.iter().any(|r| r.id == allocation.resource_id) {
            return Err(ManegeError::NotFound {
                kind: EntityKind::Resource,
                id: allocation.resource_id.clone(),
            });
        }
        Ok(())
    }
}
