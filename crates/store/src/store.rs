use async_trait::async_trait;
use chrono::NaiveDate;
use common::{
    AccountId, DiscountId, InviteId, OtpCodeId, PaymentId, ReferralProfileId, ReservationId,
    Version,
};
use domain::{
    Account, CoworkerInvite, Discount, OtpCode, Payment, PhoneNumber, Referral, ReferralCode,
    ReferralProfile, Reservation, StaffLink,
};

use crate::error::Result;

/// A versioned row the store can insert and compare-and-set.
///
/// Inserts are written at [`Version::first`]; updates are accepted only when
/// the carried version equals the stored one, and are written at `next()`.
pub trait Record: Clone + Send + Sync + 'static {
    type Key: Copy + Eq + std::hash::Hash + std::fmt::Display + Send + Sync;

    const ENTITY: &'static str;

    fn key(&self) -> Self::Key;
    fn version(&self) -> Version;
    fn set_version(&mut self, version: Version);
}

macro_rules! record {
    ($ty:ty, $key:ty, $entity:literal) => {
        impl Record for $ty {
            type Key = $key;

            const ENTITY: &'static str = $entity;

            fn key(&self) -> Self::Key {
                self.id
            }

            fn version(&self) -> Version {
                self.version
            }

            fn set_version(&mut self, version: Version) {
                self.version = version;
            }
        }
    };
}

record!(Account, AccountId, "account");
record!(Reservation, ReservationId, "reservation");
record!(Payment, PaymentId, "payment");
record!(Discount, DiscountId, "discount");
record!(ReferralProfile, ReferralProfileId, "referral profile");
record!(OtpCode, OtpCodeId, "one-time code");
record!(CoworkerInvite, InviteId, "invitation");

/// Returns `record` as it looks after a committed insert.
pub fn inserted<R: Record>(mut record: R) -> R {
    record.set_version(Version::first());
    record
}

/// Returns `record` as it looks after a committed update.
pub fn updated<R: Record>(mut record: R) -> R {
    let next = record.version().next();
    record.set_version(next);
    record
}

/// A single write inside a [`UnitOfWork`].
#[derive(Debug, Clone)]
pub enum Change {
    InsertAccount(Account),
    UpdateAccount(Account),
    InsertReservation(Reservation),
    UpdateReservation(Reservation),
    InsertPayment(Payment),
    UpdatePayment(Payment),
    InsertDiscount(Discount),
    UpdateDiscount(Discount),
    InsertReferralProfile(ReferralProfile),
    UpdateReferralProfile(ReferralProfile),
    InsertReferral(Referral),
    InsertOtp(OtpCode),
    UpdateOtp(OtpCode),
    InsertInvite(CoworkerInvite),
    UpdateInvite(CoworkerInvite),
    InsertStaffLink(StaffLink),
}

impl Change {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Change::InsertAccount(_) => "insert_account",
            Change::UpdateAccount(_) => "update_account",
            Change::InsertReservation(_) => "insert_reservation",
            Change::UpdateReservation(_) => "update_reservation",
            Change::InsertPayment(_) => "insert_payment",
            Change::UpdatePayment(_) => "update_payment",
            Change::InsertDiscount(_) => "insert_discount",
            Change::UpdateDiscount(_) => "update_discount",
            Change::InsertReferralProfile(_) => "insert_referral_profile",
            Change::UpdateReferralProfile(_) => "update_referral_profile",
            Change::InsertReferral(_) => "insert_referral",
            Change::InsertOtp(_) => "insert_otp",
            Change::UpdateOtp(_) => "update_otp",
            Change::InsertInvite(_) => "insert_invite",
            Change::UpdateInvite(_) => "update_invite",
            Change::InsertStaffLink(_) => "insert_staff_link",
        }
    }
}

/// An ordered batch of writes applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    changes: Vec<Change>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Builder-style variant of [`UnitOfWork::push`].
    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl From<Change> for UnitOfWork {
    fn from(change: Change) -> Self {
        UnitOfWork::new().with(change)
    }
}

/// Persistent storage for every booking record.
///
/// Reads return committed state. All writes go through [`BookingStore::commit`],
/// which either applies the whole unit of work or none of it. Implementations
/// must enforce:
/// - version compare-and-set on every update
/// - no two active reservations overlapping on the same date
/// - the uniqueness constraints named in [`crate::constraints`]
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    async fn account(&self, id: AccountId) -> Result<Option<Account>>;

    async fn account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>>;

    /// All accounts, oldest first.
    async fn accounts(&self) -> Result<Vec<Account>>;

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Reservations on `date` in any status, ordered by start time.
    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>>;

    /// Reservations booked by `account`, ordered by date then start time.
    async fn reservations_for_account(&self, account: AccountId) -> Result<Vec<Reservation>>;

    /// Reservations assigned to `coworker`, ordered by date then start time.
    async fn reservations_for_coworker(&self, coworker: AccountId) -> Result<Vec<Reservation>>;

    /// Every reservation, ordered by date then start time.
    async fn all_reservations(&self) -> Result<Vec<Reservation>>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn payment_for_reservation(&self, reservation: ReservationId)
    -> Result<Option<Payment>>;

    /// Payments made by `account`, newest first.
    async fn payments_for_account(&self, account: AccountId) -> Result<Vec<Payment>>;

    async fn discount(&self, id: DiscountId) -> Result<Option<Discount>>;

    /// Discounts held by `account` in any state, newest first.
    async fn discounts_for_account(&self, account: AccountId) -> Result<Vec<Discount>>;

    async fn referral_profile_for_account(
        &self,
        account: AccountId,
    ) -> Result<Option<ReferralProfile>>;

    async fn referral_profile_by_code(&self, code: &ReferralCode)
    -> Result<Option<ReferralProfile>>;

    async fn referral_for_invitee(&self, invitee: AccountId) -> Result<Option<Referral>>;

    /// Referral edges created with `inviter`'s code, newest first.
    async fn referrals_by_inviter(&self, inviter: AccountId) -> Result<Vec<Referral>>;

    /// The most recently issued code for `phone`, consumed or not.
    async fn latest_otp(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>>;

    async fn invite_by_code(&self, code: &str) -> Result<Option<CoworkerInvite>>;

    /// Coworkers linked to `manager`, oldest first.
    async fn staff_links_for_manager(&self, manager: AccountId) -> Result<Vec<StaffLink>>;

    /// Applies every change in `work` atomically.
    async fn commit(&self, work: UnitOfWork) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::Role;

    fn account() -> Account {
        Account::new(
            PhoneNumber::parse("09120000000").unwrap(),
            "Sara",
            "K",
            Role::Customer,
            Utc::now(),
        )
    }

    #[test]
    fn inserted_and_updated_bump_versions() {
        let account = account();
        assert_eq!(account.version, Version::initial());

        let account = inserted(account);
        assert_eq!(account.version, Version::first());

        let account = updated(account);
        assert_eq!(account.version, Version::new(2));
    }

    #[test]
    fn unit_of_work_keeps_order() {
        let account = account();
        let mut work = UnitOfWork::new();
        work.push(Change::InsertAccount(account.clone()))
            .push(Change::UpdateAccount(account));

        let labels: Vec<_> = work.changes().iter().map(Change::label).collect();
        assert_eq!(labels, vec!["insert_account", "update_account"]);
        assert_eq!(work.len(), 2);
    }
}
