//! Reservations and their lifecycle.

mod slot;
mod state;

pub use slot::TimeSlot;
pub use state::{BillingStatus, ReservationStatus};

use chrono::{DateTime, NaiveDate, Utc};
use common::{AccountId, ReservationId, Version};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const MAX_SERVICE_TYPE_LEN: usize = 50;

/// A booked slot in the salon calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub account_id: AccountId,
    pub coworker_id: Option<AccountId>,
    pub service_type: String,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub status: ReservationStatus,
    pub billing_status: BillingStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// Input for booking a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub account_id: AccountId,
    pub service_type: String,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub note: Option<String>,
}

/// Partial update of a reservation. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPatch {
    pub status: Option<ReservationStatus>,
    pub billing_status: Option<BillingStatus>,
    /// `Some("")` clears the note.
    pub note: Option<String>,
}

impl ReservationPatch {
    pub fn status(status: ReservationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_billing_status(mut self, billing_status: BillingStatus) -> Self {
        self.billing_status = Some(billing_status);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.billing_status.is_none() && self.note.is_none()
    }
}

impl Reservation {
    /// Builds a pending, unpaid reservation.
    pub fn new(input: NewReservation, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let service_type = input.service_type.trim().to_string();
        if service_type.is_empty() || service_type.chars().count() > MAX_SERVICE_TYPE_LEN {
            return Err(DomainError::InvalidServiceType(input.service_type));
        }
        let slot = TimeSlot::new(input.slot.start(), input.slot.end())?;

        Ok(Self {
            id: ReservationId::new(),
            account_id: input.account_id,
            coworker_id: None,
            service_type,
            date: input.date,
            slot,
            status: ReservationStatus::Pending,
            billing_status: BillingStatus::Unpaid,
            note: normalize_note(input.note),
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Returns a copy with the patch applied.
    ///
    /// Status changes must follow the lifecycle; the version is left as loaded
    /// so the store can check it.
    pub fn with_patch(
        &self,
        patch: &ReservationPatch,
        now: DateTime<Utc>,
    ) -> Result<Reservation, DomainError> {
        let mut updated = self.clone();

        if let Some(status) = patch.status {
            updated.status = self.status.transition_to(status)?;
        }
        if let Some(billing_status) = patch.billing_status {
            updated.billing_status = billing_status;
        }
        if let Some(note) = &patch.note {
            updated.note = normalize_note(Some(note.clone()));
        }
        updated.updated_at = now;

        Ok(updated)
    }

    /// Returns a copy served by `coworker`.
    pub fn with_coworker(
        &self,
        coworker: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: self.status,
            });
        }
        let mut updated = self.clone();
        updated.coworker_id = Some(coworker);
        updated.updated_at = now;
        Ok(updated)
    }

    /// Returns true if this reservation blocks `slot` on `date`.
    pub fn blocks(&self, date: NaiveDate, slot: &TimeSlot) -> bool {
        self.status.occupies_slot() && self.date == date && self.slot.overlaps(slot)
    }

    pub fn is_owned_by(&self, account: AccountId) -> bool {
        self.account_id == account
    }
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
