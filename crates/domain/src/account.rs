//! Accounts, roles and capabilities.

use chrono::{DateTime, Utc};
use common::{AccountId, Version};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A phone number normalised to digits with an optional leading `+`.
///
/// Spaces, dashes, dots and parentheses are stripped on parse so that
/// `+98 912-345 6789` and `+989123456789` identify the same account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => ("+", rest),
            None => ("", trimmed),
        };

        let digits: String = rest
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidPhone(raw.to_string()));
        }

        Ok(Self(format!("{plus}{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role tag carried by every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Coworker,
    Manager,
    Admin,
}

/// Something an account may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Book, pay for and cancel one's own reservations.
    BookForSelf,
    /// Be assigned to reservations and cancel them on a customer's behalf.
    ServeReservations,
    /// See every reservation in the salon.
    ViewAllReservations,
    /// Assign coworkers to reservations.
    AssignStaff,
    /// Hand out manual discounts.
    IssueDiscounts,
    /// Create coworker invitations.
    InviteCoworkers,
    /// Change roles and activation of other accounts.
    ManageAccounts,
}

impl Role {
    /// Returns true if this role grants `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;

        match self {
            Role::Customer => matches!(capability, BookForSelf),
            Role::Coworker => matches!(capability, BookForSelf | ServeReservations),
            Role::Manager => !matches!(capability, ManageAccounts),
            Role::Admin => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Coworker => "coworker",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "coworker" => Ok(Role::Coworker),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BookForSelf => "book for self",
            Capability::ServeReservations => "serve reservations",
            Capability::ViewAllReservations => "view all reservations",
            Capability::AssignStaff => "assign staff",
            Capability::IssueDiscounts => "issue discounts",
            Capability::InviteCoworkers => "invite coworkers",
            Capability::ManageAccounts => "manage accounts",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account in the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub phone: PhoneNumber,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl Account {
    /// Creates a new active account.
    pub fn new(
        phone: PhoneNumber,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            phone,
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            role,
            active: true,
            created_at: now,
            version: Version::initial(),
        }
    }

    /// Fails unless the account is active and its role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::InactiveAccount);
        }
        if !self.role.can(capability) {
            return Err(DomainError::NotPermitted {
                role: self.role,
                capability,
            });
        }
        Ok(())
    }

    /// Returns the display name, falling back to the phone number.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.phone.to_string()
        } else {
            full.to_string()
        }
    }

    /// Returns a copy with the patch applied.
    pub fn with_patch(&self, patch: &AccountPatch) -> Account {
        let mut updated = self.clone();
        if let Some(first) = &patch.first_name {
            updated.first_name = first.trim().to_string();
        }
        if let Some(last) = &patch.last_name {
            updated.last_name = last.trim().to_string();
        }
        updated
    }
}

/// Profile fields an account holder may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
