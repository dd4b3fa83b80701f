//! Single-use discounts.

use chrono::{DateTime, Utc};
use common::{AccountId, DiscountId, Money, Version};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Why a discount was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Reward for reaching the referral threshold.
    ReferralBonus,
    /// Issued by staff.
    Manual,
    /// Campaign or seasonal offer.
    Promotion,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::ReferralBonus => "referral_bonus",
            DiscountKind::Manual => "manual",
            DiscountKind::Promotion => "promotion",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referral_bonus" => Ok(DiscountKind::ReferralBonus),
            "manual" => Ok(DiscountKind::Manual),
            "promotion" => Ok(DiscountKind::Promotion),
            other => Err(DomainError::UnknownVariant {
                kind: "discount kind",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a discount takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// 1..=100 percent of the price.
    Percentage(u8),
    /// A fixed amount off the price.
    Fixed(Money),
}

impl DiscountValue {
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            DiscountValue::Percentage(p) if !(1..=100).contains(p) => Err(
                DomainError::InvalidDiscountValue(format!("percentage {p} outside 1..=100")),
            ),
            DiscountValue::Fixed(amount) if !amount.is_positive() => Err(
                DomainError::InvalidDiscountValue(format!("fixed amount {amount} not positive")),
            ),
            _ => Ok(()),
        }
    }

    /// Returns `price` with the discount taken off, never below zero.
    pub fn apply_to(&self, price: Money) -> Money {
        match self {
            DiscountValue::Percentage(p) => price.saturating_sub(price.percent(*p)),
            DiscountValue::Fixed(amount) => price.saturating_sub(*amount),
        }
    }
}

/// A discount owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub account_id: AccountId,
    pub kind: DiscountKind,
    pub value: DiscountValue,
    pub used: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl Discount {
    /// Creates an unused discount.
    pub fn new(
        account_id: AccountId,
        kind: DiscountKind,
        value: DiscountValue,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        value.validate()?;
        Ok(Self {
            id: DiscountId::new(),
            account_id,
            kind,
            value,
            used: false,
            expires_at,
            created_at: now,
            version: Version::initial(),
        })
    }

    /// Returns true once `now` has reached the expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns a redeemed copy.
    ///
    /// Checks run in order: ownership, single use, expiry.
    pub fn redeem(&self, account: AccountId, now: DateTime<Utc>) -> Result<Discount, DomainError> {
        if self.account_id != account {
            return Err(DomainError::NotOwner("discount"));
        }
        if self.used {
            return Err(DomainError::AlreadyUsed("discount"));
        }
        if self.is_expired(now) {
            return Err(DomainError::Expired("discount"));
        }
        let mut redeemed = self.clone();
        redeemed.used = true;
        Ok(redeemed)
    }

    pub fn discounted_price(&self, price: Money) -> Money {
        self.value.apply_to(price)
    }
}
