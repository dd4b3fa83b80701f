use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{AccountId, DiscountId, PaymentId, ReservationId};
use domain::{
    Account, CoworkerInvite, Discount, OtpCode, Payment, PhoneNumber, Referral, ReferralCode,
    ReferralProfile, Reservation, StaffLink,
};
use tokio::sync::RwLock;

use crate::constraints;
use crate::store::{BookingStore, Change, Record, UnitOfWork, inserted, updated};
use crate::{Result, StoreError};

/// Rows of one record type, kept in insertion order.
#[derive(Clone)]
struct Table<R: Record> {
    rows: Vec<R>,
    index: HashMap<R::Key, usize>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    fn get(&self, key: R::Key) -> Option<&R> {
        self.index.get(&key).map(|&pos| &self.rows[pos])
    }

    fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.iter()
    }

    fn insert(&mut self, record: R) -> Result<()> {
        let key = record.key();
        if self.index.contains_key(&key) {
            return Err(StoreError::UniqueViolation(constraints::PRIMARY_KEY));
        }
        self.index.insert(key, self.rows.len());
        self.rows.push(inserted(record));
        Ok(())
    }

    fn update(&mut self, record: R) -> Result<()> {
        let key = record.key();
        let pos = *self.index.get(&key).ok_or_else(|| StoreError::Missing {
            entity: R::ENTITY,
            id: key.to_string(),
        })?;

        if self.rows[pos].version() != record.version() {
            return Err(StoreError::VersionConflict {
                entity: R::ENTITY,
                id: key.to_string(),
                expected: record.version(),
            });
        }

        self.rows[pos] = updated(record);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Tables {
    accounts: Table<Account>,
    reservations: Table<Reservation>,
    payments: Table<Payment>,
    discounts: Table<Discount>,
    referral_profiles: Table<ReferralProfile>,
    referrals: Vec<Referral>,
    otps: Table<OtpCode>,
    invites: Table<CoworkerInvite>,
    staff_links: Vec<StaffLink>,
}

impl Tables {
    fn apply(&mut self, change: Change) -> Result<()> {
        match change {
            Change::InsertAccount(account) => {
                self.check_phone(&account)?;
                self.accounts.insert(account)
            }
            Change::UpdateAccount(account) => {
                self.check_phone(&account)?;
                self.accounts.update(account)
            }
            Change::InsertReservation(reservation) => {
                self.check_overlap(&reservation)?;
                self.reservations.insert(reservation)
            }
            Change::UpdateReservation(reservation) => {
                self.check_overlap(&reservation)?;
                self.reservations.update(reservation)
            }
            Change::InsertPayment(payment) => {
                self.check_payment(&payment)?;
                self.payments.insert(payment)
            }
            Change::UpdatePayment(payment) => {
                self.check_payment(&payment)?;
                self.payments.update(payment)
            }
            Change::InsertDiscount(discount) => self.discounts.insert(discount),
            Change::UpdateDiscount(discount) => self.discounts.update(discount),
            Change::InsertReferralProfile(profile) => {
                self.check_profile(&profile)?;
                self.referral_profiles.insert(profile)
            }
            Change::UpdateReferralProfile(profile) => {
                self.check_profile(&profile)?;
                self.referral_profiles.update(profile)
            }
            Change::InsertReferral(referral) => {
                if self
                    .referrals
                    .iter()
                    .any(|r| r.invitee_id == referral.invitee_id)
                {
                    return Err(StoreError::UniqueViolation(constraints::REFERRALS_INVITEE));
                }
                self.referrals.push(referral);
                Ok(())
            }
            Change::InsertOtp(otp) => self.otps.insert(otp),
            Change::UpdateOtp(otp) => self.otps.update(otp),
            Change::InsertInvite(invite) => {
                self.check_invite(&invite)?;
                self.invites.insert(invite)
            }
            Change::UpdateInvite(invite) => {
                self.check_invite(&invite)?;
                self.invites.update(invite)
            }
            Change::InsertStaffLink(link) => {
                if self
                    .staff_links
                    .iter()
                    .any(|l| l.manager_id == link.manager_id && l.coworker_id == link.coworker_id)
                {
                    return Err(StoreError::UniqueViolation(constraints::STAFF_LINKS_PAIR));
                }
                self.staff_links.push(link);
                Ok(())
            }
        }
    }

    fn check_phone(&self, account: &Account) -> Result<()> {
        if self
            .accounts
            .iter()
            .any(|a| a.id != account.id && a.phone == account.phone)
        {
            return Err(StoreError::UniqueViolation(constraints::ACCOUNTS_PHONE));
        }
        Ok(())
    }

    fn check_overlap(&self, reservation: &Reservation) -> Result<()> {
        if !reservation.status.occupies_slot() {
            return Ok(());
        }
        if self
            .reservations
            .iter()
            .any(|r| r.id != reservation.id && r.blocks(reservation.date, &reservation.slot))
        {
            return Err(StoreError::SlotTaken {
                date: reservation.date,
                slot: reservation.slot,
            });
        }
        Ok(())
    }

    fn check_payment(&self, payment: &Payment) -> Result<()> {
        if self
            .payments
            .iter()
            .any(|p| p.id != payment.id && p.reservation_id == payment.reservation_id)
        {
            return Err(StoreError::UniqueViolation(
                constraints::PAYMENTS_RESERVATION,
            ));
        }
        Ok(())
    }

    fn check_profile(&self, profile: &ReferralProfile) -> Result<()> {
        for other in self.referral_profiles.iter().filter(|p| p.id != profile.id) {
            if other.account_id == profile.account_id {
                return Err(StoreError::UniqueViolation(
                    constraints::REFERRAL_PROFILES_ACCOUNT,
                ));
            }
            if other.code == profile.code {
                return Err(StoreError::UniqueViolation(
                    constraints::REFERRAL_PROFILES_CODE,
                ));
            }
        }
        Ok(())
    }

    fn check_invite(&self, invite: &CoworkerInvite) -> Result<()> {
        if self
            .invites
            .iter()
            .any(|i| i.id != invite.id && i.code == invite.code)
        {
            return Err(StoreError::UniqueViolation(
                constraints::COWORKER_INVITES_CODE,
            ));
        }
        Ok(())
    }
}

fn by_schedule(reservations: &mut [Reservation]) {
    reservations.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.slot.start().cmp(&b.slot.start()))
    });
}

/// In-memory store for tests and database-less runs.
///
/// Enforces the same versioning and uniqueness rules as the Postgres store.
/// A commit works on a copy of every table and swaps it in only when each
/// change succeeded, so a failed unit of work leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail before anything is written.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of stored reservations in any status.
    pub async fn reservation_count(&self) -> usize {
        self.tables.read().await.reservations.rows.len()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(id).cloned())
    }

    async fn account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().find(|a| &a.phone == phone).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<_> = tables.accounts.iter().cloned().collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.tables.read().await.reservations.get(id).cloned())
    }

    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<_> = tables
            .reservations
            .iter()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        by_schedule(&mut reservations);
        Ok(reservations)
    }

    async fn reservations_for_account(&self, account: AccountId) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<_> = tables
            .reservations
            .iter()
            .filter(|r| r.account_id == account)
            .cloned()
            .collect();
        by_schedule(&mut reservations);
        Ok(reservations)
    }

    async fn reservations_for_coworker(&self, coworker: AccountId) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<_> = tables
            .reservations
            .iter()
            .filter(|r| r.coworker_id == Some(coworker))
            .cloned()
            .collect();
        by_schedule(&mut reservations);
        Ok(reservations)
    }

    async fn all_reservations(&self) -> Result<Vec<Reservation>> {
        let tables = self.tables.read().await;
        let mut reservations: Vec<_> = tables.reservations.iter().cloned().collect();
        by_schedule(&mut reservations);
        Ok(reservations)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(id).cloned())
    }

    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.reservation_id == reservation)
            .cloned())
    }

    async fn payments_for_account(&self, account: AccountId) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<_> = tables
            .payments
            .iter()
            .filter(|p| p.account_id == account)
            .cloned()
            .collect();
        payments.reverse();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn discount(&self, id: DiscountId) -> Result<Option<Discount>> {
        Ok(self.tables.read().await.discounts.get(id).cloned())
    }

    async fn discounts_for_account(&self, account: AccountId) -> Result<Vec<Discount>> {
        let tables = self.tables.read().await;
        let mut discounts: Vec<_> = tables
            .discounts
            .iter()
            .filter(|d| d.account_id == account)
            .cloned()
            .collect();
        discounts.reverse();
        discounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(discounts)
    }

    async fn referral_profile_for_account(
        &self,
        account: AccountId,
    ) -> Result<Option<ReferralProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referral_profiles
            .iter()
            .find(|p| p.account_id == account)
            .cloned())
    }

    async fn referral_profile_by_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<ReferralProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referral_profiles
            .iter()
            .find(|p| &p.code == code)
            .cloned())
    }

    async fn referral_for_invitee(&self, invitee: AccountId) -> Result<Option<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .iter()
            .find(|r| r.invitee_id == invitee)
            .cloned())
    }

    async fn referrals_by_inviter(&self, inviter: AccountId) -> Result<Vec<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .iter()
            .rev()
            .filter(|r| r.inviter_id == inviter)
            .cloned()
            .collect())
    }

    async fn latest_otp(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>> {
        let tables = self.tables.read().await;
        // Later inserts win ties on created_at.
        Ok(tables
            .otps
            .iter()
            .filter(|o| &o.phone == phone)
            .fold(None::<&OtpCode>, |latest, otp| match latest {
                Some(current) if current.created_at > otp.created_at => Some(current),
                _ => Some(otp),
            })
            .cloned())
    }

    async fn invite_by_code(&self, code: &str) -> Result<Option<CoworkerInvite>> {
        let tables = self.tables.read().await;
        Ok(tables.invites.iter().find(|i| i.code == code).cloned())
    }

    async fn staff_links_for_manager(&self, manager: AccountId) -> Result<Vec<StaffLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .staff_links
            .iter()
            .filter(|l| l.manager_id == manager)
            .cloned()
            .collect())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut tables = self.tables.write().await;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let mut staged = tables.clone();
        for change in work.into_changes() {
            let label = change.label();
            staged.apply(change).inspect_err(|e| {
                tracing::debug!(change = label, error = %e, "Unit of work rejected");
            })?;
        }

        *tables = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use common::{Money, Version};
    use domain::{
        DiscountKind, DiscountValue, NewReservation, PaymentKind, ReservationPatch,
        ReservationStatus, Role, TimeSlot,
    };

    fn phone(raw: &str) -> PhoneNumber {
        PhoneNumber::parse(raw).unwrap()
    }

    fn account(raw_phone: &str) -> Account {
        Account::new(phone(raw_phone), "Test", "User", Role::Customer, Utc::now())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn slot(start: (u32, u32), end: (u32, u32)) -> TimeSlot {
        TimeSlot::new(
            NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        )
        .unwrap()
    }

    fn reservation(owner: AccountId, slot: TimeSlot) -> Reservation {
        Reservation::new(
            NewReservation {
                account_id: owner,
                service_type: "haircut".to_string(),
                date: date(),
                slot,
                note: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_writes_first_version() {
        let store = InMemoryStore::new();
        let account = account("09120000001");
        store
            .commit(Change::InsertAccount(account.clone()).into())
            .await
            .unwrap();

        let stored = store.account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::first());
        assert_eq!(
            store.account_by_phone(&account.phone).await.unwrap(),
            Some(stored)
        );
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected() {
        let store = InMemoryStore::new();
        store
            .commit(Change::InsertAccount(account("09120000001")).into())
            .await
            .unwrap();

        let result = store
            .commit(Change::InsertAccount(account("0912 000 0001")).into())
            .await;
        assert!(matches!(
            result,
            Err(ref e) if e.violates(constraints::ACCOUNTS_PHONE)
        ));
    }

    #[tokio::test]
    async fn stale_update_is_a_version_conflict() {
        let store = InMemoryStore::new();
        let account = account("09120000001");
        store
            .commit(Change::InsertAccount(account.clone()).into())
            .await
            .unwrap();
        let loaded = store.account(account.id).await.unwrap().unwrap();

        let mut first = loaded.clone();
        first.first_name = "First".to_string();
        store
            .commit(Change::UpdateAccount(first).into())
            .await
            .unwrap();

        let mut second = loaded;
        second.first_name = "Second".to_string();
        let result = store.commit(Change::UpdateAccount(second).into()).await;
        assert!(matches!(result, Err(ref e) if e.is_version_conflict()));

        let stored = store.account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "First");
        assert_eq!(stored.version, Version::new(2));
    }

    #[tokio::test]
    async fn overlapping_reservation_is_rejected() {
        let store = InMemoryStore::new();
        let owner = AccountId::new();
        store
            .commit(Change::InsertReservation(reservation(owner, slot((10, 0), (11, 0)))).into())
            .await
            .unwrap();

        let result = store
            .commit(Change::InsertReservation(reservation(owner, slot((10, 30), (11, 30)))).into())
            .await;
        assert!(matches!(result, Err(StoreError::SlotTaken { .. })));

        // Touching slots do not overlap.
        store
            .commit(Change::InsertReservation(reservation(owner, slot((11, 0), (12, 0)))).into())
            .await
            .unwrap();
        assert_eq!(store.reservation_count().await, 2);
    }

    #[tokio::test]
    async fn cancelled_reservation_frees_its_slot() {
        let store = InMemoryStore::new();
        let owner = AccountId::new();
        let booked = reservation(owner, slot((10, 0), (11, 0)));
        store
            .commit(Change::InsertReservation(booked.clone()).into())
            .await
            .unwrap();

        let loaded = store.reservation(booked.id).await.unwrap().unwrap();
        let cancelled = loaded
            .with_patch(&ReservationPatch::status(ReservationStatus::Cancelled), Utc::now())
            .unwrap();
        store
            .commit(Change::UpdateReservation(cancelled).into())
            .await
            .unwrap();

        store
            .commit(Change::InsertReservation(reservation(owner, slot((10, 0), (11, 0)))).into())
            .await
            .unwrap();
        assert_eq!(store.reservations_on(date()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_change_rolls_back_whole_unit() {
        let store = InMemoryStore::new();
        let owner = account("09120000001");
        let discount = Discount::new(
            owner.id,
            DiscountKind::Manual,
            DiscountValue::Percentage(10),
            None,
            Utc::now(),
        )
        .unwrap();

        let work = UnitOfWork::new()
            .with(Change::InsertAccount(owner.clone()))
            .with(Change::InsertDiscount(discount.clone()))
            .with(Change::InsertAccount(account("09120000001")));
        assert!(store.commit(work).await.is_err());

        assert!(store.account(owner.id).await.unwrap().is_none());
        assert!(store.discount(discount.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure_writes_nothing() {
        let store = InMemoryStore::new();
        let account = account("09120000001");
        store.fail_next_commit();

        let result = store
            .commit(Change::InsertAccount(account.clone()).into())
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.account(account.id).await.unwrap().is_none());

        // Only the next commit fails.
        store
            .commit(Change::InsertAccount(account.clone()).into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn one_payment_row_per_reservation() {
        let store = InMemoryStore::new();
        let owner = AccountId::new();
        let booked = reservation(owner, slot((9, 0), (9, 30)));
        let payment = |amount| {
            Payment::pending(
                owner,
                booked.id,
                Money::from_major(amount),
                PaymentKind::Full,
                Utc::now(),
            )
            .unwrap()
        };

        store
            .commit(Change::InsertPayment(payment(100)).into())
            .await
            .unwrap();
        let result = store.commit(Change::InsertPayment(payment(50)).into()).await;
        assert!(matches!(
            result,
            Err(ref e) if e.violates(constraints::PAYMENTS_RESERVATION)
        ));
    }

    #[tokio::test]
    async fn latest_otp_prefers_newest() {
        let store = InMemoryStore::new();
        let phone = phone("09120000001");
        let now = Utc::now();
        let older = OtpCode::issue(phone.clone(), chrono::Duration::minutes(3), now).unwrap();
        let newer = OtpCode::issue(phone.clone(), chrono::Duration::minutes(3), now).unwrap();

        let work = UnitOfWork::new()
            .with(Change::InsertOtp(older))
            .with(Change::InsertOtp(newer.clone()));
        store.commit(work).await.unwrap();

        let latest = store.latest_otp(&phone).await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }
}
