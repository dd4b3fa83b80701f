//! Booking services for the salon booking core.
//!
//! This crate turns requests into units of work against a
//! [`store::BookingStore`]:
//! - [`IdentityService`]: accounts, one-time codes, coworker invitations
//! - [`ConflictDetector`]: read-only slot overlap checks
//! - [`ReservationLedger`]: reservation lifecycle and staff assignment
//! - [`PaymentLedger`]: settlement, committed together with the reservation
//! - [`DiscountEngine`]: issuance and single-use redemption
//! - [`ReferralEngine`]: invitation counting and threshold rewards
//!
//! Every check-then-write sequence ends in one atomic commit. Operations
//! that may lose a version race re-read and decide again, up to
//! [`BookingSettings::max_conflict_retries`] times.

pub mod conflict;
mod context;
pub mod discounts;
pub mod error;
pub mod identity;
pub mod payments;
pub mod referrals;
pub mod reservations;
pub mod sender;
pub mod settings;

use std::sync::Arc;

use common::{Clock, SystemClock};
use store::BookingStore;

use context::Context;

pub use conflict::{ConflictDetector, overlapping};
pub use discounts::DiscountEngine;
pub use error::{BookingError, ErrorKind, Result};
pub use identity::IdentityService;
pub use payments::PaymentLedger;
pub use referrals::{ReferralEngine, ReferralOutcome};
pub use reservations::ReservationLedger;
pub use sender::{InMemoryOtpSender, LoggingOtpSender, OtpSender};
pub use settings::BookingSettings;

/// All booking services wired to one store, clock and settings.
#[derive(Clone)]
pub struct Booking<S> {
    identity: IdentityService<S>,
    conflicts: ConflictDetector<S>,
    reservations: ReservationLedger<S>,
    payments: PaymentLedger<S>,
    discounts: DiscountEngine<S>,
    referrals: ReferralEngine<S>,
}

impl<S: BookingStore + Clone> Booking<S> {
    /// Wires the services with the system clock and a logging code sender.
    pub fn new(store: S, settings: BookingSettings) -> Self {
        Self::with_collaborators(
            store,
            settings,
            Arc::new(SystemClock),
            Arc::new(LoggingOtpSender),
        )
    }

    pub fn with_collaborators(
        store: S,
        settings: BookingSettings,
        clock: Arc<dyn Clock>,
        sender: Arc<dyn OtpSender>,
    ) -> Self {
        let ctx = Context {
            store: store.clone(),
            clock,
            settings: Arc::new(settings),
        };

        Self {
            identity: IdentityService::new(ctx.clone(), sender),
            conflicts: ConflictDetector::new(store),
            reservations: ReservationLedger::new(ctx.clone()),
            payments: PaymentLedger::new(ctx.clone()),
            discounts: DiscountEngine::new(ctx.clone()),
            referrals: ReferralEngine::new(ctx),
        }
    }

    pub fn identity(&self) -> &IdentityService<S> {
        &self.identity
    }

    pub fn conflicts(&self) -> &ConflictDetector<S> {
        &self.conflicts
    }

    pub fn reservations(&self) -> &ReservationLedger<S> {
        &self.reservations
    }

    pub fn payments(&self) -> &PaymentLedger<S> {
        &self.payments
    }

    pub fn discounts(&self) -> &DiscountEngine<S> {
        &self.discounts
    }

    pub fn referrals(&self) -> &ReferralEngine<S> {
        &self.referrals
    }
}
