//! Reservation ledger: creation, lifecycle and staff assignment.

use chrono::{NaiveDate, NaiveTime};
use common::{AccountId, ReservationId};
use domain::{
    Capability, NewReservation, Reservation, ReservationPatch, ReservationStatus, TimeSlot,
};
use store::{BookingStore, Change, inserted, updated};

use crate::conflict::ConflictDetector;
use crate::context::Context;
use crate::error::{BookingError, Result, log_failure};

/// Owns the reservation lifecycle.
///
/// States: `pending → {deposit_paid, done, cancelled}`,
/// `deposit_paid → {done, cancelled}`; `done` and `cancelled` are terminal.
#[derive(Clone)]
pub struct ReservationLedger<S> {
    ctx: Context<S>,
    detector: ConflictDetector<S>,
}

impl<S: BookingStore + Clone> ReservationLedger<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        let detector = ConflictDetector::new(ctx.store.clone());
        Self { ctx, detector }
    }

    /// Books a slot for the account in `input`.
    ///
    /// The conflict check runs first for a precise answer; the store enforces
    /// the same rule inside the insert, so two racing creates cannot both win.
    #[tracing::instrument(skip(self, input), fields(account = %input.account_id, date = %input.date))]
    pub async fn create(&self, input: NewReservation) -> Result<Reservation> {
        self.try_create(input).await.inspect_err(log_failure)
    }

    /// Books `start` plus the default slot length.
    #[tracing::instrument(skip(self, note))]
    pub async fn create_at(
        &self,
        account: AccountId,
        service_type: String,
        date: NaiveDate,
        start: NaiveTime,
        note: Option<String>,
    ) -> Result<Reservation> {
        let slot = TimeSlot::starting_at(start, self.ctx.settings.default_slot)
            .map_err(BookingError::from)
            .inspect_err(log_failure)?;

        self.create(NewReservation {
            account_id: account,
            service_type,
            date,
            slot,
            note,
        })
        .await
    }

    async fn try_create(&self, input: NewReservation) -> Result<Reservation> {
        let account = self.ctx.active_account(input.account_id).await?;
        account.require(Capability::BookForSelf)?;

        let now = self.ctx.now();
        if input.date < now.date_naive() {
            return Err(BookingError::validation(format!(
                "cannot book {} in the past",
                input.date
            )));
        }

        let reservation = Reservation::new(input, now)?;

        if !self
            .detector
            .conflicts_with(reservation.date, &reservation.slot)
            .await?
            .is_empty()
        {
            metrics::counter!("reservation_conflicts_total").increment(1);
            return Err(BookingError::conflict(reservation.date, &reservation.slot));
        }

        self.ctx
            .commit(Change::InsertReservation(reservation.clone()).into())
            .await
            .map_err(BookingError::from)
            .inspect_err(|e| {
                if matches!(e, BookingError::Conflict { .. }) {
                    metrics::counter!("reservation_conflicts_total").increment(1);
                }
            })?;

        metrics::counter!("reservations_created_total").increment(1);
        tracing::info!(
            reservation = %reservation.id,
            slot = %reservation.slot,
            "Reservation created"
        );
        Ok(inserted(reservation))
    }

    /// Applies the fields present in `patch`.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, id: ReservationId, patch: ReservationPatch) -> Result<Reservation> {
        let patch = &patch;
        self.ctx
            .retrying("reservation.update", move || self.try_update(id, patch))
            .await
            .inspect_err(log_failure)
    }

    async fn try_update(&self, id: ReservationId, patch: &ReservationPatch) -> Result<Reservation> {
        let current = self.get_unlogged(id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        let changed = current.with_patch(patch, self.ctx.now())?;
        self.ctx
            .commit(Change::UpdateReservation(changed.clone()).into())
            .await?;
        Ok(updated(changed))
    }

    /// Cancels a reservation on behalf of its owner or a staff member.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: ReservationId, actor: AccountId) -> Result<Reservation> {
        self.check_can_cancel(id, actor)
            .await
            .inspect_err(log_failure)?;

        self.update(id, ReservationPatch::status(ReservationStatus::Cancelled))
            .await
    }

    async fn check_can_cancel(&self, id: ReservationId, actor: AccountId) -> Result<()> {
        let actor = self.ctx.active_account(actor).await?;
        let reservation = self.get_unlogged(id).await?;
        if !reservation.is_owned_by(actor.id) && !actor.role.can(Capability::ServeReservations) {
            return Err(BookingError::forbidden(format!(
                "account {} cannot cancel reservation {id}",
                actor.id
            )));
        }
        Ok(())
    }

    /// Assigns a coworker to serve a reservation.
    #[tracing::instrument(skip(self))]
    pub async fn assign_coworker(
        &self,
        actor: AccountId,
        id: ReservationId,
        coworker: AccountId,
    ) -> Result<Reservation> {
        self.ctx
            .retrying("reservation.assign_coworker", move || {
                self.try_assign(actor, id, coworker)
            })
            .await
            .inspect_err(log_failure)
    }

    async fn try_assign(
        &self,
        actor: AccountId,
        id: ReservationId,
        coworker: AccountId,
    ) -> Result<Reservation> {
        self.ctx.authorize(actor, Capability::AssignStaff).await?;

        let staff = self.ctx.active_account(coworker).await?;
        if !staff.role.can(Capability::ServeReservations) {
            return Err(BookingError::validation(format!(
                "account {coworker} with role {} cannot serve reservations",
                staff.role
            )));
        }

        let reservation = self.get_unlogged(id).await?;
        let assigned = reservation.with_coworker(coworker, self.ctx.now())?;
        self.ctx
            .commit(Change::UpdateReservation(assigned.clone()).into())
            .await?;
        Ok(updated(assigned))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ReservationId) -> Result<Reservation> {
        self.get_unlogged(id).await.inspect_err(log_failure)
    }

    async fn get_unlogged(&self, id: ReservationId) -> Result<Reservation> {
        self.ctx
            .store
            .reservation(id)
            .await?
            .ok_or_else(|| BookingError::not_found("reservation", id))
    }

    /// The account's reservations by date, then start time.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_account(&self, account: AccountId) -> Result<Vec<Reservation>> {
        Ok(self.ctx.store.reservations_for_account(account).await?)
    }

    /// Every reservation; staff only.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self, actor: AccountId) -> Result<Vec<Reservation>> {
        self.ctx
            .authorize(actor, Capability::ViewAllReservations)
            .await
            .inspect_err(log_failure)?;
        Ok(self.ctx.store.all_reservations().await?)
    }

    /// Reservations a coworker is assigned to.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_coworker(&self, coworker: AccountId) -> Result<Vec<Reservation>> {
        Ok(self.ctx.store.reservations_for_coworker(coworker).await?)
    }
}
