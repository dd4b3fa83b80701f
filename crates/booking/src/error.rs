//! Caller-facing error taxonomy.

use chrono::{NaiveDate, NaiveTime};
use domain::{DomainError, TimeSlot};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the booking services.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The acting account may not perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested slot overlaps an active reservation.
    #[error("Time slot {start}-{end} on {date} overlaps an existing reservation")]
    Conflict {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },

    /// The request is malformed or breaks a lifecycle rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An account tried to apply its own referral code.
    #[error("An account cannot apply its own referral code")]
    SelfReferral,

    /// A record with the same natural key already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A single-use record was already consumed.
    #[error("This {0} has already been used")]
    AlreadyUsed(&'static str),

    /// The reservation already has a settled payment.
    #[error("Reservation is already paid")]
    AlreadyPaid,

    /// A time-limited record is past its expiry.
    #[error("This {0} has expired")]
    Expired(&'static str),

    /// The one-time code could not be handed to the delivery channel.
    #[error("Code delivery failed: {0}")]
    Delivery(String),

    /// Storage failed; the commit was rolled back.
    #[error("Internal error: {0}")]
    Internal(#[source] StoreError),
}

/// Stable classification of a [`BookingError`] for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Validation,
    SelfReferral,
    AlreadyExists,
    AlreadyUsed,
    AlreadyPaid,
    Expired,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::SelfReferral => "self_referral",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::AlreadyUsed => "already_used",
            ErrorKind::AlreadyPaid => "already_paid",
            ErrorKind::Expired => "expired",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(date: NaiveDate, slot: &TimeSlot) -> Self {
        BookingError::Conflict {
            date,
            start: slot.start(),
            end: slot.end(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        BookingError::Validation(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        BookingError::Forbidden(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::NotFound { .. } => ErrorKind::NotFound,
            BookingError::Forbidden(_) => ErrorKind::Forbidden,
            BookingError::Conflict { .. } => ErrorKind::Conflict,
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::SelfReferral => ErrorKind::SelfReferral,
            BookingError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            BookingError::AlreadyUsed(_) => ErrorKind::AlreadyUsed,
            BookingError::AlreadyPaid => ErrorKind::AlreadyPaid,
            BookingError::Expired(_) => ErrorKind::Expired,
            BookingError::Delivery(_) | BookingError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true when re-reading state and deciding again may succeed.
    ///
    /// A lost compare-and-set or a uniqueness race both mean another writer
    /// got there first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Internal(
                StoreError::VersionConflict { .. } | StoreError::UniqueViolation(_)
            )
        )
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken { date, slot } => BookingError::conflict(date, &slot),
            other => BookingError::Internal(other),
        }
    }
}

impl From<DomainError> for BookingError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::AlreadyPaid => BookingError::AlreadyPaid,
            DomainError::AlreadyUsed(what) => BookingError::AlreadyUsed(what),
            DomainError::Expired(what) => BookingError::Expired(what),
            DomainError::SelfReferral => BookingError::SelfReferral,
            DomainError::NotOwner(_)
            | DomainError::NotPermitted { .. }
            | DomainError::InactiveAccount => BookingError::Forbidden(e.to_string()),
            DomainError::InvalidPhone(_)
            | DomainError::InvalidSlot { .. }
            | DomainError::InvalidServiceType(_)
            | DomainError::InvalidTransition { .. }
            | DomainError::InvalidPaymentTransition { .. }
            | DomainError::NonPositiveAmount(_)
            | DomainError::InvalidDiscountValue(_)
            | DomainError::CodeMismatch
            | DomainError::InvalidCode(_)
            | DomainError::SelfInvite
            | DomainError::OutOfRange(_)
            | DomainError::UnknownVariant { .. } => BookingError::Validation(e.to_string()),
        }
    }
}

/// Logs a failed operation: rejections at warn, storage failures at error.
pub(crate) fn log_failure(e: &BookingError) {
    match e.kind() {
        ErrorKind::Internal => tracing::error!(error = %e, "Booking operation failed"),
        kind => tracing::warn!(error = %e, kind = %kind, "Booking request rejected"),
    }
}

/// Result type for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;
