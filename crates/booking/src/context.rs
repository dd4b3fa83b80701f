use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{AccountId, Clock};
use domain::{Account, Capability};
use store::{BookingStore, StoreError, UnitOfWork};

use crate::error::{BookingError, Result};
use crate::settings::BookingSettings;

/// Collaborators every service needs.
#[derive(Clone)]
pub(crate) struct Context<S> {
    pub store: S,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<BookingSettings>,
}

impl<S: BookingStore> Context<S> {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn account(&self, id: AccountId) -> Result<Account> {
        self.store
            .account(id)
            .await?
            .ok_or_else(|| BookingError::not_found("account", id))
    }

    /// Loads an account that may act: it must exist and be active.
    pub async fn active_account(&self, id: AccountId) -> Result<Account> {
        let account = self.account(id).await?;
        if !account.active {
            return Err(BookingError::forbidden(format!("account {id} is inactive")));
        }
        Ok(account)
    }

    /// Loads an active account whose role grants `capability`.
    pub async fn authorize(&self, id: AccountId, capability: Capability) -> Result<Account> {
        let account = self.account(id).await?;
        account.require(capability)?;
        Ok(account)
    }

    pub async fn commit(&self, work: UnitOfWork) -> std::result::Result<(), StoreError> {
        let started = Instant::now();
        let result = self.store.commit(work).await;
        metrics::histogram!("store_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result
            && e.is_version_conflict()
        {
            metrics::counter!("store_commit_conflicts_total").increment(1);
        }
        result
    }

    /// Runs `attempt` until it succeeds, fails for a non-race reason, or the
    /// retry budget is spent.
    pub async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let limit = self.settings.max_conflict_retries;
        let mut retries = 0;

        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && retries < limit => {
                    retries += 1;
                    tracing::debug!(operation, retries, error = %e, "Lost a write race, retrying");
                }
                other => return other,
            }
        }
    }
}
