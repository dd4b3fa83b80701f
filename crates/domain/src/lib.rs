//! Domain layer for the salon booking core.
//!
//! Records and the pure rules that govern them:
//! - Accounts with a closed role enumeration and capability checks
//! - Reservations with a status state machine and half-open time slots
//! - Payments linked to reservations
//! - Single-use discounts
//! - Referral profiles, referral edges and the reward threshold
//! - One-time codes and coworker invitations
//!
//! Nothing here touches storage; every mutating method returns an updated
//! copy so the caller can hand it to the store together with the version it
//! was derived from.

pub mod account;
pub mod code;
pub mod discount;
pub mod error;
pub mod otp;
pub mod payment;
pub mod referral;
pub mod reservation;
pub mod staff;

pub use account::{Account, AccountPatch, Capability, PhoneNumber, Role};
pub use discount::{Discount, DiscountKind, DiscountValue};
pub use error::DomainError;
pub use otp::OtpCode;
pub use payment::{Payment, PaymentKind, PaymentStatus};
pub use referral::{
    InviteOutcome, Referral, ReferralCode, ReferralPolicy, ReferralProfile,
};
pub use reservation::{
    BillingStatus, NewReservation, Reservation, ReservationPatch, ReservationStatus, TimeSlot,
};
pub use staff::{CoworkerInvite, StaffLink};
