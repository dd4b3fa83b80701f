//! Coworker invitations and manager → coworker edges.

use chrono::{DateTime, Utc};
use common::{AccountId, InviteId, StaffLinkId, Version};
use serde::{Deserialize, Serialize};

use crate::code;
use crate::error::DomainError;

pub const INVITE_CODE_LEN: usize = 10;

/// An invitation a manager hands to a future coworker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoworkerInvite {
    pub id: InviteId,
    pub manager_id: AccountId,
    pub code: String,
    pub accepted_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub version: Version,
}

impl CoworkerInvite {
    pub fn new(manager_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            id: InviteId::new(),
            manager_id,
            code: code::alphanumeric_code(INVITE_CODE_LEN),
            accepted_by: None,
            created_at: now,
            accepted_at: None,
            version: Version::initial(),
        }
    }

    /// Returns an accepted copy.
    pub fn accept(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<CoworkerInvite, DomainError> {
        if self.accepted_by.is_some() {
            return Err(DomainError::AlreadyUsed("invitation"));
        }
        if self.manager_id == account {
            return Err(DomainError::SelfInvite);
        }
        let mut accepted = self.clone();
        accepted.accepted_by = Some(account);
        accepted.accepted_at = Some(now);
        Ok(accepted)
    }

    /// Regenerates the code after a collision.
    pub fn with_fresh_code(mut self) -> Self {
        self.code = code::alphanumeric_code(INVITE_CODE_LEN);
        self
    }
}

/// A directed manager → coworker edge. Belongs to neither account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffLink {
    pub id: StaffLinkId,
    pub manager_id: AccountId,
    pub coworker_id: AccountId,
    pub invite_id: InviteId,
    pub created_at: DateTime<Utc>,
}

impl StaffLink {
    pub fn from_invite(invite: &CoworkerInvite, coworker_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            id: StaffLinkId::new(),
            manager_id: invite.manager_id,
            coworker_id,
            invite_id: invite.id,
            created_at: now,
        }
    }
}
