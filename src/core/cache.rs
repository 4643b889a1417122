//! TTL-gated, single-flight cache of division journals.

use super::clock::Clock;
use super::error::{AdapterError, Error, Result};
use super::journal::{AccountId, DivisionId, LedgerRecord};
use super::window::Window;
use crate::store::JournalStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

/// What a call to [`CacheStore::refresh_if_stale`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cached journal was young enough; nothing was fetched.
    Fresh,
    /// The journal was fetched and committed.
    Refreshed { stored: usize, rejected: usize },
}

type DivisionKey = (AccountId, DivisionId);

pub struct CacheStore {
    store: Arc<dyn JournalStore>,
    clock: Arc<dyn Clock>,
    refresh_timeout: Duration,
    refresh_locks: Mutex<HashMap<DivisionKey, Arc<Mutex<()>>>>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn JournalStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn JournalStore> {
        &self.store
    }

    /// True when the division was never refreshed or its last refresh is older than `ttl`.
    pub async fn stale_after(
        &self,
        account: &AccountId,
        division: DivisionId,
        ttl: Duration,
    ) -> Result<bool> {
        let metadata = self
            .store
            .metadata(account, division)
            .await
            .map_err(|source| Error::Store {
                account: *account,
                division,
                source,
            })?;
        let Some(updated_at) = metadata.updated_at else {
            return Ok(true);
        };
        // A stamp from the future (clock skew) reads as fresh.
        Ok((self.clock.now() - updated_at)
            .to_std()
            .is_ok_and(|age| age > ttl))
    }

    /// Refreshes the division from `fetch` when it is stale.
    ///
    /// Only one refresh per division runs at a time; callers arriving meanwhile wait
    /// for it and then find the division fresh. The fetched records and the new
    /// timestamp are committed together, so a failed fetch, a timeout or a dropped
    /// future leaves both untouched and the next call retries from scratch.
    pub async fn refresh_if_stale<F, Fut>(
        &self,
        account: &AccountId,
        division: DivisionId,
        ttl: Duration,
        fetch: F,
    ) -> Result<RefreshOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<LedgerRecord>, AdapterError>>,
    {
        self.refresh(account, division, ttl, None, fetch).await
    }

    /// Like [`refresh_if_stale`], with the fetch also holding a permit of `permits`.
    ///
    /// The permit is taken after the division lock, and the refresh timeout only
    /// starts once it is held, so queueing for upstream capacity never counts as
    /// a slow fetch.
    ///
    /// [`refresh_if_stale`]: CacheStore::refresh_if_stale
    pub async fn refresh_if_stale_limited<F, Fut>(
        &self,
        account: &AccountId,
        division: DivisionId,
        ttl: Duration,
        permits: &Semaphore,
        fetch: F,
    ) -> Result<RefreshOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<LedgerRecord>, AdapterError>>,
    {
        self.refresh(account, division, ttl, Some(permits), fetch).await
    }

    async fn refresh<F, Fut>(
        &self,
        account: &AccountId,
        division: DivisionId,
        ttl: Duration,
        permits: Option<&Semaphore>,
        fetch: F,
    ) -> Result<RefreshOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<LedgerRecord>, AdapterError>>,
    {
        if !self.stale_after(account, division, ttl).await? {
            debug!(%account, division, "Journal cache HIT");
            return Ok(RefreshOutcome::Fresh);
        }

        let lock = self.refresh_lock(account, division).await;
        let _guard = lock.lock().await;
        if !self.stale_after(account, division, ttl).await? {
            debug!(%account, division, "Journal refreshed by a concurrent caller");
            return Ok(RefreshOutcome::Fresh);
        }

        let _permit = match permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };
        debug!(%account, division, "Journal cache MISS, fetching");
        let fetched = tokio::time::timeout(self.refresh_timeout, fetch())
            .await
            .map_err(|_| Error::Timeout {
                account: *account,
                division,
                timeout: self.refresh_timeout,
            })??;

        let total = fetched.len();
        let valid: Vec<LedgerRecord> = fetched
            .into_iter()
            .filter(|record| match record.validate() {
                Ok(()) => true,
                Err(reason) => {
                    warn!(%account, division, %reason, "Rejecting journal record");
                    false
                }
            })
            .collect();
        let stored = valid.len();

        let stamp = self
            .store
            .commit(account, division, &valid, self.clock.now())
            .await
            .map_err(|source| Error::Store {
                account: *account,
                division,
                source,
            })?;

        info!(%account, division, stored, updated_at = %stamp, "Refreshed journal");
        Ok(RefreshOutcome::Refreshed {
            stored,
            rejected: total - stored,
        })
    }

    /// Cached records of a division inside `window`.
    pub async fn range(
        &self,
        account: &AccountId,
        division: DivisionId,
        window: &Window,
    ) -> Result<Vec<LedgerRecord>> {
        self.store
            .range(account, division, window)
            .await
            .map_err(|source| Error::Store {
                account: *account,
                division,
                source,
            })
    }

    async fn refresh_lock(&self, account: &AccountId, division: DivisionId) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        Arc::clone(locks.entry((*account, division)).or_default())
    }
}
