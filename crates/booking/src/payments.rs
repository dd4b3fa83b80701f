//! Payment ledger: settlement against reservations.

use common::{AccountId, Money, PaymentId, ReservationId};
use domain::{
    BillingStatus, DomainError, Payment, PaymentKind, Reservation, ReservationPatch,
};
use store::{BookingStore, Change, UnitOfWork, inserted, updated};

use crate::context::Context;
use crate::error::{BookingError, Result, log_failure};

/// Records payments and moves the paid reservation forward in the same commit.
#[derive(Clone)]
pub struct PaymentLedger<S> {
    ctx: Context<S>,
}

impl<S: BookingStore> PaymentLedger<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Settles `amount` against a reservation owned by `account`.
    ///
    /// A `full` payment completes the reservation, a `deposit` advances it to
    /// `deposit_paid`. Once a reservation is paid every further attempt fails
    /// with [`BookingError::AlreadyPaid`] and changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment(
        &self,
        reservation: ReservationId,
        account: AccountId,
        amount: Money,
        kind: PaymentKind,
    ) -> Result<Payment> {
        let payment = self
            .ctx
            .retrying("payment.create", move || {
                self.try_settle(reservation, account, amount, kind)
            })
            .await
            .inspect_err(log_failure)?;

        metrics::counter!("payments_settled_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(payment = %payment.id, %amount, "Payment settled");
        Ok(payment)
    }

    async fn try_settle(
        &self,
        reservation_id: ReservationId,
        account: AccountId,
        amount: Money,
        kind: PaymentKind,
    ) -> Result<Payment> {
        let reservation = self.owned_reservation(reservation_id, account).await?;
        if !amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(amount).into());
        }

        let now = self.ctx.now();
        let mut work = UnitOfWork::new();
        let payment = match self.ctx.store.payment_for_reservation(reservation_id).await? {
            Some(existing) => {
                let settled = existing.settle(amount, kind)?;
                work.push(Change::UpdatePayment(settled.clone()));
                updated(settled)
            }
            None => {
                let settled = Payment::pending(account, reservation_id, amount, kind, now)?
                    .settle(amount, kind)?;
                work.push(Change::InsertPayment(settled.clone()));
                inserted(settled)
            }
        };

        let patch = ReservationPatch::status(kind.settles_to())
            .with_billing_status(BillingStatus::Paid);
        let advanced = reservation.with_patch(&patch, now)?;
        work.push(Change::UpdateReservation(advanced));

        self.ctx.commit(work).await?;
        Ok(payment)
    }

    /// Records a checkout that has not been settled yet.
    #[tracing::instrument(skip(self))]
    pub async fn open_payment(
        &self,
        reservation: ReservationId,
        account: AccountId,
        amount: Money,
        kind: PaymentKind,
    ) -> Result<Payment> {
        self.ctx
            .retrying("payment.open", move || {
                self.try_open(reservation, account, amount, kind)
            })
            .await
            .inspect_err(log_failure)
    }

    async fn try_open(
        &self,
        reservation_id: ReservationId,
        account: AccountId,
        amount: Money,
        kind: PaymentKind,
    ) -> Result<Payment> {
        self.owned_reservation(reservation_id, account).await?;

        match self.ctx.store.payment_for_reservation(reservation_id).await? {
            Some(existing) => {
                let reopened = existing.reopen(amount, kind)?;
                self.ctx
                    .commit(Change::UpdatePayment(reopened.clone()).into())
                    .await?;
                Ok(updated(reopened))
            }
            None => {
                let pending =
                    Payment::pending(account, reservation_id, amount, kind, self.ctx.now())?;
                self.ctx
                    .commit(Change::InsertPayment(pending.clone()).into())
                    .await?;
                Ok(inserted(pending))
            }
        }
    }

    /// Marks an unsettled payment as failed.
    #[tracing::instrument(skip(self))]
    pub async fn mark_failed(&self, id: PaymentId) -> Result<Payment> {
        self.ctx
            .retrying("payment.mark_failed", move || self.try_mark_failed(id))
            .await
            .inspect_err(log_failure)
    }

    async fn try_mark_failed(&self, id: PaymentId) -> Result<Payment> {
        let payment = self.get_unlogged(id).await?;
        let failed = payment.fail()?;
        self.ctx
            .commit(Change::UpdatePayment(failed.clone()).into())
            .await?;
        Ok(updated(failed))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        self.get_unlogged(id).await.inspect_err(log_failure)
    }

    async fn get_unlogged(&self, id: PaymentId) -> Result<Payment> {
        self.ctx
            .store
            .payment(id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment", id))
    }

    /// Payments made by `account`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_account(&self, account: AccountId) -> Result<Vec<Payment>> {
        Ok(self.ctx.store.payments_for_account(account).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>> {
        Ok(self.ctx.store.payment_for_reservation(reservation).await?)
    }

    async fn owned_reservation(
        &self,
        id: ReservationId,
        account: AccountId,
    ) -> Result<Reservation> {
        self.ctx.active_account(account).await?;
        let reservation = self
            .ctx
            .store
            .reservation(id)
            .await?
            .ok_or_else(|| BookingError::not_found("reservation", id))?;

        if !reservation.is_owned_by(account) {
            return Err(BookingError::forbidden(format!(
                "reservation {id} does not belong to account {account}"
            )));
        }
        Ok(reservation)
    }
}
