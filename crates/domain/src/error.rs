//! Domain error types.

use chrono::NaiveTime;
use common::Money;
use thiserror::Error;

use crate::account::{Capability, Role};
use crate::payment::PaymentStatus;
use crate::reservation::ReservationStatus;

/// Rule violations raised by the booking records themselves.
///
/// These never involve storage; the service layer translates them into the
/// caller-facing error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Phone number is not 8-15 digits with an optional leading `+`.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    /// A slot must end strictly after it starts, within the same day.
    #[error("Invalid time slot: {start} - {end}")]
    InvalidSlot { start: NaiveTime, end: NaiveTime },

    /// Service type must be non-empty and at most 50 characters.
    #[error("Invalid service type: {0:?}")]
    InvalidServiceType(String),

    /// Reservation status change not allowed by the lifecycle.
    #[error("Invalid state transition: cannot move reservation from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// Payment status change not allowed by the lifecycle.
    #[error("Invalid payment transition: cannot move payment from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The reservation already has a settled payment.
    #[error("Reservation is already paid")]
    AlreadyPaid,

    /// Payment amounts must be strictly positive.
    #[error("Payment amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    /// Percentage out of 1..=100 or non-positive fixed amount.
    #[error("Invalid discount value: {0}")]
    InvalidDiscountValue(String),

    /// The acting account does not own the record.
    #[error("Account does not own this {0}")]
    NotOwner(&'static str),

    /// The role lacks the capability the operation needs.
    #[error("Role {role} is not allowed to {capability}")]
    NotPermitted { role: Role, capability: Capability },

    /// The account has been deactivated.
    #[error("Account is inactive")]
    InactiveAccount,

    /// A single-use record was already consumed.
    #[error("{0} has already been used")]
    AlreadyUsed(&'static str),

    /// A time-limited record is past its expiry.
    #[error("{0} has expired")]
    Expired(&'static str),

    /// The supplied one-time code does not match.
    #[error("One-time code does not match")]
    CodeMismatch,

    /// Referral or invite code is malformed.
    #[error("Invalid code: {0:?}")]
    InvalidCode(String),

    /// An account tried to apply its own referral code.
    #[error("Cannot apply your own referral code")]
    SelfReferral,

    /// A manager tried to accept their own coworker invitation.
    #[error("Cannot accept your own invitation")]
    SelfInvite,

    /// A computed instant falls outside the representable calendar.
    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    /// Unknown value for a closed enumeration.
    #[error("Unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}
