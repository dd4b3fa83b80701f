//! Identity: accounts, phone verification and coworker invitations.

use std::sync::Arc;

use common::AccountId;
use domain::{
    Account, AccountPatch, Capability, CoworkerInvite, OtpCode, PhoneNumber, Role, StaffLink,
};
use store::{BookingStore, Change, UnitOfWork, constraints, inserted, updated};

use crate::context::Context;
use crate::error::{BookingError, Result, log_failure};
use crate::sender::OtpSender;

/// Owns accounts and everything that proves or grants who an account is.
#[derive(Clone)]
pub struct IdentityService<S> {
    ctx: Context<S>,
    sender: Arc<dyn OtpSender>,
}

impl<S: BookingStore> IdentityService<S> {
    pub(crate) fn new(ctx: Context<S>, sender: Arc<dyn OtpSender>) -> Self {
        Self { ctx, sender }
    }

    /// Creates an active account for `phone`.
    #[tracing::instrument(skip(self, first_name, last_name))]
    pub async fn register(
        &self,
        phone: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<Account> {
        self.try_register(phone, first_name, last_name, role)
            .await
            .inspect_err(log_failure)
    }

    async fn try_register(
        &self,
        phone: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<Account> {
        let phone = PhoneNumber::parse(phone)?;
        if self.ctx.store.account_by_phone(&phone).await?.is_some() {
            return Err(phone_taken(&phone));
        }

        let account = Account::new(phone, first_name, last_name, role, self.ctx.now());
        self.ctx
            .commit(Change::InsertAccount(account.clone()).into())
            .await
            .map_err(|e| match e {
                e if e.violates(constraints::ACCOUNTS_PHONE) => phone_taken(&account.phone),
                e => e.into(),
            })?;

        tracing::info!(account = %account.id, role = %account.role, "Account registered");
        Ok(inserted(account))
    }

    /// Issues a one-time code for `phone` and hands it to the sender.
    ///
    /// The code is stored before delivery; a failed delivery leaves it
    /// unusable only in the sense that nobody received it.
    #[tracing::instrument(skip(self))]
    pub async fn request_code(&self, phone: &str) -> Result<OtpCode> {
        self.try_request_code(phone).await.inspect_err(log_failure)
    }

    async fn try_request_code(&self, phone: &str) -> Result<OtpCode> {
        let phone = PhoneNumber::parse(phone)?;
        let otp = OtpCode::issue(phone, self.ctx.settings.otp_ttl, self.ctx.now())?;
        self.ctx
            .commit(Change::InsertOtp(otp.clone()).into())
            .await?;

        self.sender.send(&otp.phone, &otp.code).await?;
        Ok(inserted(otp))
    }

    /// Checks `code` against the most recent code issued for `phone`.
    ///
    /// On success the code is consumed and the phone's account returned,
    /// creating a customer account on first verification.
    #[tracing::instrument(skip(self, code))]
    pub async fn verify_code(&self, phone: &str, code: &str) -> Result<Account> {
        self.ctx
            .retrying("identity.verify_code", move || self.try_verify(phone, code))
            .await
            .inspect_err(log_failure)
    }

    async fn try_verify(&self, phone: &str, code: &str) -> Result<Account> {
        let phone = PhoneNumber::parse(phone)?;
        let otp = self
            .ctx
            .store
            .latest_otp(&phone)
            .await?
            .ok_or_else(|| BookingError::not_found("one-time code", &phone))?;

        let now = self.ctx.now();
        let consumed = otp.verify(code, now)?;
        let mut work = UnitOfWork::from(Change::UpdateOtp(consumed));

        let (account, created) = match self.ctx.store.account_by_phone(&phone).await? {
            Some(existing) => (existing, false),
            None => {
                let fresh = Account::new(phone, "", "", Role::Customer, now);
                work.push(Change::InsertAccount(fresh.clone()));
                (inserted(fresh), true)
            }
        };

        self.ctx.commit(work).await?;
        if created {
            tracing::info!(account = %account.id, "Account created on first verification");
        }
        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: AccountId) -> Result<Account> {
        self.ctx.account(id).await.inspect_err(log_failure)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        let phone = PhoneNumber::parse(phone)
            .map_err(BookingError::from)
            .inspect_err(log_failure)?;
        Ok(self.ctx.store.account_by_phone(&phone).await?)
    }

    /// Every account, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self, actor: AccountId) -> Result<Vec<Account>> {
        self.ctx
            .authorize(actor, Capability::ManageAccounts)
            .await
            .inspect_err(log_failure)?;
        Ok(self.ctx.store.accounts().await?)
    }

    /// Changes the holder's first and last name.
    #[tracing::instrument(skip(self))]
    pub async fn update_profile(&self, id: AccountId, patch: AccountPatch) -> Result<Account> {
        let patch = &patch;
        self.ctx
            .retrying("identity.update_profile", move || {
                self.save_account(id, move |account| Ok(account.with_patch(patch)))
            })
            .await
            .inspect_err(log_failure)
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_role(&self, actor: AccountId, id: AccountId, role: Role) -> Result<Account> {
        self.ctx
            .authorize(actor, Capability::ManageAccounts)
            .await
            .inspect_err(log_failure)?;

        self.ctx
            .retrying("identity.change_role", move || {
                self.save_account(id, move |account| {
                    let mut changed = account.clone();
                    changed.role = role;
                    Ok(changed)
                })
            })
            .await
            .inspect_err(log_failure)
    }

    /// Activates or deactivates an account. Inactive accounts keep their
    /// records but cannot book, pay, redeem or refer.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        actor: AccountId,
        id: AccountId,
        active: bool,
    ) -> Result<Account> {
        self.ctx
            .authorize(actor, Capability::ManageAccounts)
            .await
            .inspect_err(log_failure)?;

        self.ctx
            .retrying("identity.set_active", move || {
                self.save_account(id, move |account| {
                    let mut changed = account.clone();
                    changed.active = active;
                    Ok(changed)
                })
            })
            .await
            .inspect_err(log_failure)
    }

    async fn save_account<F>(&self, id: AccountId, change: F) -> Result<Account>
    where
        F: FnOnce(&Account) -> Result<Account>,
    {
        let current = self.ctx.account(id).await?;
        let changed = change(&current)?;
        if changed == current {
            return Ok(current);
        }
        self.ctx
            .commit(Change::UpdateAccount(changed.clone()).into())
            .await?;
        Ok(updated(changed))
    }

    /// Creates an invitation code a future coworker can accept.
    #[tracing::instrument(skip(self))]
    pub async fn create_coworker_invite(&self, manager: AccountId) -> Result<CoworkerInvite> {
        self.try_create_invite(manager)
            .await
            .inspect_err(log_failure)
    }

    async fn try_create_invite(&self, manager: AccountId) -> Result<CoworkerInvite> {
        self.ctx
            .authorize(manager, Capability::InviteCoworkers)
            .await?;

        let mut invite = CoworkerInvite::new(manager, self.ctx.now());
        let mut attempts = 0;
        loop {
            match self
                .ctx
                .commit(Change::InsertInvite(invite.clone()).into())
                .await
            {
                Ok(()) => break,
                Err(e)
                    if e.violates(constraints::COWORKER_INVITES_CODE)
                        && attempts < self.ctx.settings.max_conflict_retries =>
                {
                    attempts += 1;
                    tracing::debug!(attempts, "Invite code collided, regenerating");
                    invite = invite.with_fresh_code();
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(invite = %invite.id, %manager, "Coworker invite created");
        Ok(inserted(invite))
    }

    /// Accepts an invitation: the account becomes a coworker of the
    /// inviting manager.
    #[tracing::instrument(skip(self, code))]
    pub async fn accept_coworker_invite(
        &self,
        account: AccountId,
        code: &str,
    ) -> Result<StaffLink> {
        self.ctx
            .retrying("identity.accept_invite", move || {
                self.try_accept(account, code)
            })
            .await
            .inspect_err(log_failure)
    }

    async fn try_accept(&self, account_id: AccountId, code: &str) -> Result<StaffLink> {
        let account = self.ctx.active_account(account_id).await?;
        let code = code.trim();
        let invite = self
            .ctx
            .store
            .invite_by_code(code)
            .await?
            .ok_or_else(|| BookingError::not_found("invitation", code))?;

        let now = self.ctx.now();
        let accepted = invite.accept(account_id, now)?;
        let link = StaffLink::from_invite(&accepted, account_id, now);

        let mut work = UnitOfWork::from(Change::UpdateInvite(accepted));
        if account.role == Role::Customer {
            let mut promoted = account.clone();
            promoted.role = Role::Coworker;
            work.push(Change::UpdateAccount(promoted));
        }
        work.push(Change::InsertStaffLink(link.clone()));

        self.ctx.commit(work).await.map_err(|e| match e {
            e if e.violates(constraints::STAFF_LINKS_PAIR) => BookingError::AlreadyExists(
                format!("account {account_id} already works for {}", link.manager_id),
            ),
            e => BookingError::from(e),
        })?;

        tracing::info!(manager = %link.manager_id, coworker = %account_id, "Coworker linked");
        Ok(link)
    }

    /// Accounts linked to `manager` through accepted invitations, oldest
    /// link first.
    #[tracing::instrument(skip(self))]
    pub async fn coworkers_of(&self, manager: AccountId) -> Result<Vec<Account>> {
        let links = self.ctx.store.staff_links_for_manager(manager).await?;
        let mut coworkers = Vec::with_capacity(links.len());
        for link in links {
            if let Some(account) = self.ctx.store.account(link.coworker_id).await? {
                coworkers.push(account);
            }
        }
        Ok(coworkers)
    }
}

fn phone_taken(phone: &PhoneNumber) -> BookingError {
    BookingError::AlreadyExists(format!("an account with phone {phone} already exists"))
}
