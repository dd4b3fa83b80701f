//! Referral accrual: profiles, invitation edges and threshold rewards.

use common::AccountId;
use domain::{Discount, InviteOutcome, Referral, ReferralCode, ReferralProfile};
use serde::Serialize;
use store::{BookingStore, Change, UnitOfWork, inserted};

use crate::context::Context;
use crate::discounts::DiscountEngine;
use crate::error::{BookingError, Result, log_failure};

/// What applying a referral code did for the code's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferralOutcome {
    /// The invitation was counted; no reward yet.
    Progress { invited_count: u32 },
    /// The invitation completed a cycle and the owner received a reward.
    RewardIssued { discount: Discount },
}

#[derive(Clone)]
pub struct ReferralEngine<S> {
    ctx: Context<S>,
    discounts: DiscountEngine<S>,
}

impl<S: BookingStore + Clone> ReferralEngine<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        let discounts = DiscountEngine::new(ctx.clone());
        Self { ctx, discounts }
    }

    /// Returns the account's referral profile, creating it on first use.
    ///
    /// A code collision regenerates the code on the next attempt; a racing
    /// create for the same account resolves to the stored profile.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_profile(&self, account: AccountId) -> Result<ReferralProfile> {
        self.ctx
            .retrying("referral.profile", move || self.try_get_or_create(account))
            .await
            .inspect_err(log_failure)
    }

    async fn try_get_or_create(&self, account: AccountId) -> Result<ReferralProfile> {
        if let Some(profile) = self.ctx.store.referral_profile_for_account(account).await? {
            return Ok(profile);
        }
        self.ctx.account(account).await?;

        let profile = ReferralProfile::new(account, ReferralCode::generate(), self.ctx.now());
        self.ctx
            .commit(Change::InsertReferralProfile(profile.clone()).into())
            .await?;
        tracing::info!(%account, code = %profile.code, "Referral profile created");
        Ok(inserted(profile))
    }

    /// Returns the account's profile if it has one.
    #[tracing::instrument(skip(self))]
    pub async fn profile(&self, account: AccountId) -> Result<Option<ReferralProfile>> {
        Ok(self.ctx.store.referral_profile_for_account(account).await?)
    }

    /// Credits the owner of `code` with an invitation from `applicant`.
    ///
    /// The profile update, the referral edge and, on the threshold, the
    /// reward discount are committed together against the profile version.
    #[tracing::instrument(skip(self))]
    pub async fn apply_code(&self, applicant: AccountId, code: &str) -> Result<ReferralOutcome> {
        let outcome = self
            .ctx
            .retrying("referral.apply", move || self.try_apply(applicant, code))
            .await
            .inspect_err(log_failure)?;

        if let ReferralOutcome::RewardIssued { discount } = &outcome {
            metrics::counter!("referral_rewards_issued_total").increment(1);
            tracing::info!(
                owner = %discount.account_id,
                discount = %discount.id,
                "Referral reward issued"
            );
        }
        Ok(outcome)
    }

    async fn try_apply(&self, applicant: AccountId, raw: &str) -> Result<ReferralOutcome> {
        self.ctx.active_account(applicant).await?;

        let code = ReferralCode::parse(raw)
            .map_err(|_| BookingError::not_found("referral code", raw.trim()))?;
        let profile = self
            .ctx
            .store
            .referral_profile_by_code(&code)
            .await?
            .ok_or_else(|| BookingError::not_found("referral code", &code))?;
        profile.ensure_not_owner(applicant)?;

        if let Some(existing) = self.ctx.store.referral_for_invitee(applicant).await? {
            return Err(BookingError::validation(format!(
                "account {applicant} was already referred by {}",
                existing.inviter_id
            )));
        }

        let policy = self.ctx.settings.referral;
        let now = self.ctx.now();
        let (counted, progress) = profile.record_invite(&policy);
        let edge = Referral::new(profile.account_id, applicant, code, now);

        let mut work = UnitOfWork::new();
        work.push(Change::UpdateReferralProfile(counted))
            .push(Change::InsertReferral(edge));

        let outcome = match progress {
            InviteOutcome::Progress { invited_count } => {
                ReferralOutcome::Progress { invited_count }
            }
            InviteOutcome::ThresholdReached => {
                let reward = self.discounts.draft(
                    profile.account_id,
                    policy.reward_kind(),
                    policy.reward_value(),
                    policy.reward_expiry(now)?,
                )?;
                work.push(Change::InsertDiscount(reward.clone()));
                ReferralOutcome::RewardIssued {
                    discount: inserted(reward),
                }
            }
        };

        self.ctx.commit(work).await?;
        Ok(outcome)
    }

    /// Referral edges recorded for `inviter`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn referrals_by(&self, inviter: AccountId) -> Result<Vec<Referral>> {
        Ok(self.ctx.store.referrals_by_inviter(inviter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(ReferralOutcome::Progress { invited_count: 3 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "outcome": "progress", "invited_count": 3 })
        );
    }
}
