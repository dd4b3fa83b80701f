//! Referral profiles, inviter → invitee edges and the reward threshold.

use chrono::{DateTime, Duration, Utc};
use common::{AccountId, ReferralId, ReferralProfileId, Version};
use serde::{Deserialize, Serialize};

use crate::code;
use crate::discount::{DiscountKind, DiscountValue};
use crate::error::DomainError;

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 8;

/// A shareable referral code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Generates a fresh random code.
    pub fn generate() -> Self {
        Self(code::alphanumeric_code(REFERRAL_CODE_LEN))
    }

    /// Normalises user input: trims and upper-cases.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if !(4..=20).contains(&normalized.len()) || !code::is_alphanumeric_code(&normalized) {
            return Err(DomainError::InvalidCode(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reward rules for referrals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralPolicy {
    /// Invitations needed per reward.
    pub threshold: u32,
    /// Percentage of the reward discount.
    pub reward_percent: u8,
    /// How long a reward stays redeemable; `None` never expires.
    pub reward_validity: Option<Duration>,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            reward_percent: 20,
            reward_validity: None,
        }
    }
}

impl ReferralPolicy {
    pub fn reward_kind(&self) -> DiscountKind {
        DiscountKind::ReferralBonus
    }

    pub fn reward_value(&self) -> DiscountValue {
        DiscountValue::Percentage(self.reward_percent)
    }

    /// Expiry of a reward issued at `now`; `None` when rewards never expire.
    pub fn reward_expiry(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, DomainError> {
        self.reward_validity
            .map(|validity| {
                now.checked_add_signed(validity)
                    .ok_or(DomainError::OutOfRange("referral reward expiry"))
            })
            .transpose()
    }
}

/// Result of counting one more invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    /// Counter moved; no reward yet.
    Progress { invited_count: u32 },
    /// Threshold reached; counter reset to zero and a reward is owed.
    ThresholdReached,
}

/// Per-account referral state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralProfile {
    pub id: ReferralProfileId,
    pub account_id: AccountId,
    pub code: ReferralCode,
    pub invited_count: u32,
    pub rewards_issued: u32,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl ReferralProfile {
    pub fn new(account_id: AccountId, code: ReferralCode, now: DateTime<Utc>) -> Self {
        Self {
            id: ReferralProfileId::new(),
            account_id,
            code,
            invited_count: 0,
            rewards_issued: 0,
            created_at: now,
            version: Version::initial(),
        }
    }

    /// Returns a copy with one more invitation counted.
    ///
    /// When the count reaches the threshold it resets to zero and
    /// `rewards_issued` is bumped in the same step.
    pub fn record_invite(&self, policy: &ReferralPolicy) -> (ReferralProfile, InviteOutcome) {
        let mut updated = self.clone();
        updated.invited_count += 1;

        if updated.invited_count >= policy.threshold.max(1) {
            updated.invited_count = 0;
            updated.rewards_issued += 1;
            (updated, InviteOutcome::ThresholdReached)
        } else {
            let invited_count = updated.invited_count;
            (updated, InviteOutcome::Progress { invited_count })
        }
    }

    /// Fails if `applicant` owns this profile.
    pub fn ensure_not_owner(&self, applicant: AccountId) -> Result<(), DomainError> {
        if self.account_id == applicant {
            return Err(DomainError::SelfReferral);
        }
        Ok(())
    }
}

/// A recorded invitation: `invitee` joined using `inviter`'s code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub inviter_id: AccountId,
    pub invitee_id: AccountId,
    pub code: ReferralCode,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn new(
        inviter_id: AccountId,
        invitee_id: AccountId,
        code: ReferralCode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReferralId::new(),
            inviter_id,
            invitee_id,
            code,
            created_at: now,
        }
    }
}
