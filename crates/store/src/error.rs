use chrono::NaiveDate;
use common::Version;
use domain::TimeSlot;
use thiserror::Error;

/// Errors that can occur when reading from or committing to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update named a version that is no longer current.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: Version,
    },

    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    Missing { entity: &'static str, id: String },

    /// Inserting or updating a reservation would overlap an active one.
    #[error("Slot {slot} on {date} overlaps an existing reservation")]
    SlotTaken { date: NaiveDate, slot: TimeSlot },

    /// A named uniqueness constraint rejected the write.
    ///
    /// The name is one of the constants in [`crate::constraints`].
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(&'static str),

    /// A stored value could not be turned back into a domain record.
    #[error("Corrupt row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },

    /// The store refused the commit (injected or backend unavailable).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if re-reading and retrying the operation may succeed.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }

    /// Returns true if the write broke the named uniqueness constraint.
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(name) if *name == constraint)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
