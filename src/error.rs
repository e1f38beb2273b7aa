//! Error types for the manege scheduling engine.

use thiserror::Error;

use crate::schedule::conflict::SessionConflict;

/// Main error type for manege operations.
#[derive(Error, Debug)]
pub enum ManegeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Availability error: {0}")]
    Availability(#[from] AvailabilityError),

    #[error("Scheduling conflict: {0}")]
    Conflict(#[from] SessionConflict),

    #[error("allocation period overlaps allocation {allocation_id} for person {person_id} and resource {resource_id}")]
    AllocationOverlap {
        allocation_id: String,
        person_id: String,
        resource_id: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Kind of entity referenced by a [`ManegeError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Resource,
    Template,
    Session,
    Allocation,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Person => "person",
            EntityKind::Resource => "resource",
            EntityKind::Template => "template",
            EntityKind::Session => "session",
            EntityKind::Allocation => "allocation",
        };
        f.write_str(name)
    }
}

/// Availability gating failures for a candidate time slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("no bookable windows configured for {weekday}")]
    NoWindows { weekday: String },

    #[error("slot {start} + {duration_minutes}min is not fully inside any bookable window on {weekday}")]
    OutsideWindows {
        weekday: String,
        start: String,
        duration_minutes: u32,
    },
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("week {week_key} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        week_key: String,
        expected: u64,
        found: u64,
    },

    #[error("corrupt data at {path}: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("store lock poisoned by a panicking writer")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for manege operations.
pub type Result<T> = std::result::Result<T, ManegeError>;
