//! One-time codes proving phone ownership.

use chrono::{DateTime, Duration, Utc};
use common::{OtpCodeId, Version};
use serde::{Deserialize, Serialize};

use crate::account::PhoneNumber;
use crate::code;
use crate::error::DomainError;

pub const OTP_LEN: usize = 6;

/// A stored one-time code with an explicit expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCode {
    pub id: OtpCodeId,
    pub phone: PhoneNumber,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl OtpCode {
    /// Issues a fresh random code valid for `ttl`.
    pub fn issue(
        phone: PhoneNumber,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(DomainError::OutOfRange("one-time code expiry"))?;

        Ok(Self {
            id: OtpCodeId::new(),
            phone,
            code: code::numeric_code(OTP_LEN),
            expires_at,
            consumed: false,
            created_at: now,
            version: Version::initial(),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns a consumed copy if `supplied` matches and the code is still live.
    pub fn verify(&self, supplied: &str, now: DateTime<Utc>) -> Result<OtpCode, DomainError> {
        if self.consumed {
            return Err(DomainError::AlreadyUsed("one-time code"));
        }
        if self.code != supplied.trim() {
            return Err(DomainError::CodeMismatch);
        }
        if self.is_expired(now) {
            return Err(DomainError::Expired("one-time code"));
        }
        let mut consumed = self.clone();
        consumed.consumed = true;
        Ok(consumed)
    }
}
