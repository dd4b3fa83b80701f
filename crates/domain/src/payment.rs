//! Payments recorded against reservations.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, PaymentId, ReservationId, Version};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::reservation::ReservationStatus;

/// What a payment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Deposit,
    Full,
}

impl PaymentKind {
    /// The reservation status a settled payment of this kind leads to.
    pub fn settles_to(&self) -> ReservationStatus {
        match self {
            PaymentKind::Deposit => ReservationStatus::DepositPaid,
            PaymentKind::Full => ReservationStatus::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Deposit => "deposit",
            PaymentKind::Full => "full",
        }
    }
}

impl std::str::FromStr for PaymentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(PaymentKind::Deposit),
            "full" => Ok(PaymentKind::Full),
            other => Err(DomainError::UnknownVariant {
                kind: "payment kind",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of a payment row.
///
/// ```text
/// Pending ──┬──► Paid
///           └──► Failed ──► Paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Paid | Failed) | (Failed, Paid))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::UnknownVariant {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment linked to exactly one reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub account_id: AccountId,
    pub reservation_id: ReservationId,
    pub amount: Money,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl Payment {
    /// Starts a payment that has not been settled yet.
    pub fn pending(
        account_id: AccountId,
        reservation_id: ReservationId,
        amount: Money,
        kind: PaymentKind,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(amount));
        }
        Ok(Self {
            id: PaymentId::new(),
            account_id,
            reservation_id,
            amount,
            kind,
            status: PaymentStatus::Pending,
            created_at: now,
            version: Version::initial(),
        })
    }

    /// Returns a settled copy carrying the final amount and kind.
    pub fn settle(&self, amount: Money, kind: PaymentKind) -> Result<Payment, DomainError> {
        if self.status == PaymentStatus::Paid {
            return Err(DomainError::AlreadyPaid);
        }
        if !amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(amount));
        }
        let mut settled = self.clone();
        settled.amount = amount;
        settled.kind = kind;
        settled.status = PaymentStatus::Paid;
        Ok(settled)
    }

    /// Returns a copy with the checkout amount and kind replaced.
    pub fn reopen(&self, amount: Money, kind: PaymentKind) -> Result<Payment, DomainError> {
        if self.status == PaymentStatus::Paid {
            return Err(DomainError::AlreadyPaid);
        }
        if !amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(amount));
        }
        let mut reopened = self.clone();
        reopened.amount = amount;
        reopened.kind = kind;
        reopened.status = PaymentStatus::Pending;
        Ok(reopened)
    }

    /// Returns a failed copy.
    pub fn fail(&self) -> Result<Payment, DomainError> {
        if self.status == PaymentStatus::Paid {
            return Err(DomainError::AlreadyPaid);
        }
        if !self.status.can_transition_to(PaymentStatus::Failed) {
            return Err(DomainError::InvalidPaymentTransition {
                from: self.status,
                to: PaymentStatus::Failed,
            });
        }
        let mut failed = self.clone();
        failed.status = PaymentStatus::Failed;
        Ok(failed)
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}
