//! Person and resource entities.
//!
//! Both pools are owned by an external management layer; the engine only
//! needs their ids, active flags and active windows to validate sessions.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ManegeError, Result};

/// Identifier of a person (rider).
pub type PersonId = String;

/// Identifier of a shared resource (horse).
pub type ResourceId = String;

fn default_true() -> bool {
    true
}

/// A person who books sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,
    /// Display name.
    pub name: String,
    /// Whether the person is currently enrolled.
    #[serde(default = "default_true")]
    pub active: bool,
    /// First day of the active window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the active window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl Person {
    /// Create a new active person with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            active: true,
            start_date: None,
            end_date: None,
            notes: String::new(),
        }
    }

    /// Bound the active window.
    pub fn with_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Whether the person is active on the given date (flag and window).
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        if let Some(start) = self.start_date {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// A shared bookable resource used during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// Whether the resource is currently in service.
    #[serde(default = "default_true")]
    pub active: bool,
    /// First day of the active window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the active window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Fixed owner, mutually exclusive with `house_owned`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_person_id: Option<PersonId>,
    /// House-owned resources are usable by anyone.
    #[serde(default)]
    pub house_owned: bool,
    /// Free-form category (pony, horse, ...).
    #[serde(default)]
    pub kind: String,
}

impl Resource {
    /// Create a new active resource with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            active: true,
            start_date: None,
            end_date: None,
            owner_person_id: None,
            house_owned: false,
            kind: String::new(),
        }
    }

    /// Assign a fixed owner (clears the house-owned flag).
    pub fn with_owner(mut self, person_id: impl Into<PersonId>) -> Self {
        self.owner_person_id = Some(person_id.into());
        self.house_owned = false;
        self
    }

    /// Mark as house-owned (clears any fixed owner).
    pub fn house(mut self) -> Self {
        self.house_owned = true;
        self.owner_person_id = None;
        self
    }

    /// Whether the resource is in service on the given date (flag and window).
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if !self.active {
            return false;
        }
        if let Some(start) = self.start_date {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if date > end {
                return false;
            }
        }
        true
    }

    /// Owner linkage and house-owned flag are mutually exclusive.
    pub fn validate(&self) -> Result<()> {
        if self.owner_person_id.is_some() && self.house_owned {
            return Err(ManegeError::Validation(format!(
                "resource {} cannot be both house-owned and owned by a person",
                self.id
            )));
        }
        Ok(())
    }
}

/// Today's date, shared helper for "active now" checks.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
