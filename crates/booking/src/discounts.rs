//! Discount engine: issuance and single-use redemption.

use chrono::{DateTime, Utc};
use common::{AccountId, DiscountId};
use domain::{Capability, Discount, DiscountKind, DiscountValue};
use store::{BookingStore, Change, inserted, updated};

use crate::context::Context;
use crate::error::{BookingError, Result, log_failure};

#[derive(Clone)]
pub struct DiscountEngine<S> {
    ctx: Context<S>,
}

impl<S: BookingStore> DiscountEngine<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Builds a validated, unused discount without storing it.
    ///
    /// Every issuance path goes through here, including referral rewards,
    /// which add the draft to their own unit of work.
    pub fn draft(
        &self,
        account: AccountId,
        kind: DiscountKind,
        value: DiscountValue,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Discount> {
        Ok(Discount::new(
            account,
            kind,
            value,
            expires_at,
            self.ctx.now(),
        )?)
    }

    /// Stores a new discount for `account`.
    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        account: AccountId,
        kind: DiscountKind,
        value: DiscountValue,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Discount> {
        self.try_create(account, kind, value, expires_at)
            .await
            .inspect_err(log_failure)
    }

    async fn try_create(
        &self,
        account: AccountId,
        kind: DiscountKind,
        value: DiscountValue,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Discount> {
        self.ctx.account(account).await?;
        let discount = self.draft(account, kind, value, expires_at)?;
        self.ctx
            .commit(Change::InsertDiscount(discount.clone()).into())
            .await?;
        tracing::info!(discount = %discount.id, %account, "Discount issued");
        Ok(inserted(discount))
    }

    /// Staff path: `actor` hands a discount to `account`.
    #[tracing::instrument(skip(self))]
    pub async fn issue(
        &self,
        actor: AccountId,
        account: AccountId,
        kind: DiscountKind,
        value: DiscountValue,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Discount> {
        self.ctx
            .authorize(actor, Capability::IssueDiscounts)
            .await
            .inspect_err(log_failure)?;
        self.create(account, kind, value, expires_at).await
    }

    /// Redeems a discount for its owner.
    ///
    /// The write is a compare-and-set on the loaded version; when another
    /// redemption wins the race the retry re-reads the used record and
    /// reports [`BookingError::AlreadyUsed`].
    #[tracing::instrument(skip(self))]
    pub async fn apply(&self, discount: DiscountId, account: AccountId) -> Result<Discount> {
        let redeemed = self
            .ctx
            .retrying("discount.apply", move || self.try_apply(discount, account))
            .await
            .inspect_err(log_failure)?;

        metrics::counter!("discounts_redeemed_total").increment(1);
        Ok(redeemed)
    }

    async fn try_apply(&self, id: DiscountId, account: AccountId) -> Result<Discount> {
        let discount = self
            .ctx
            .store
            .discount(id)
            .await?
            .ok_or_else(|| BookingError::not_found("discount", id))?;
        self.ctx.active_account(account).await?;

        let redeemed = discount.redeem(account, self.ctx.now())?;
        self.ctx
            .commit(Change::UpdateDiscount(redeemed.clone()).into())
            .await?;
        Ok(updated(redeemed))
    }

    /// Unused discounts held by `account`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_account(&self, account: AccountId) -> Result<Vec<Discount>> {
        let mut held = self.ctx.store.discounts_for_account(account).await?;
        held.retain(|d| !d.used);
        Ok(held)
    }

    /// Every discount `account` ever held, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn history_for_account(&self, account: AccountId) -> Result<Vec<Discount>> {
        Ok(self.ctx.store.discounts_for_account(account).await?)
    }
}
