//! Reservation state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The lifecycle status of a reservation.
///
/// State transitions:
/// ```text
/// Pending ──┬──► DepositPaid ──┬──► Done
///           │                  │
///           ├──────────────────┼──► Done
///           │                  │
///           └──────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Booked, nothing paid yet.
    #[default]
    Pending,

    /// A deposit has been paid.
    DepositPaid,

    /// Fully settled (terminal state).
    Done,

    /// Cancelled; frees the slot (terminal state).
    Cancelled,
}

impl ReservationStatus {
    /// Returns true if moving to `next` is allowed.
    ///
    /// Re-asserting the current status is allowed and changes nothing.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;

        *self == next
            || matches!(
                (self, next),
                (Pending, DepositPaid | Done | Cancelled) | (DepositPaid, Done | Cancelled)
            )
    }

    /// Returns `next` if the transition is allowed.
    pub fn transition_to(
        &self,
        next: ReservationStatus,
    ) -> Result<ReservationStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Done | ReservationStatus::Cancelled)
    }

    /// Returns true if a reservation in this state holds its slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }

    /// Returns the state name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::DepositPaid => "deposit_paid",
            ReservationStatus::Done => "done",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "deposit_paid" => Ok(ReservationStatus::DepositPaid),
            "done" => Ok(ReservationStatus::Done),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(DomainError::UnknownVariant {
                kind: "reservation status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a reservation has been paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    #[default]
    Unpaid,
    Paid,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Unpaid => "unpaid",
            BillingStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for BillingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(BillingStatus::Unpaid),
            "paid" => Ok(BillingStatus::Paid),
            other => Err(DomainError::UnknownVariant {
                kind: "billing status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
