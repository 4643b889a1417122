//! Cross-account summaries over cached division journals.

use super::balance::{Balance, BalanceByDivision, BalanceByDivisionByType, BalanceByType};
use super::cache::CacheStore;
use super::category::CategoryTable;
use super::error::Result;
use super::journal::{Division, LedgerRecord};
use super::source::{JournalSource, collect_journal};
use super::window::Window;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Records of one division, one slice per requested window.
struct LoadedDivision {
    name: String,
    slices: Vec<Vec<LedgerRecord>>,
}

impl LoadedDivision {
    fn slice(&self, index: usize) -> &[LedgerRecord] {
        self.slices.get(index).map(Vec::as_slice).unwrap_or_default()
    }
}

type LoadedAccount = Vec<LoadedDivision>;

pub struct Aggregator {
    sources: Vec<Arc<dyn JournalSource>>,
    cache: Arc<CacheStore>,
    categories: Arc<CategoryTable>,
    ttl: Duration,
    max_concurrency: usize,
    upstream_permits: Arc<Semaphore>,
}

impl Aggregator {
    pub fn new(
        sources: Vec<Arc<dyn JournalSource>>,
        cache: Arc<CacheStore>,
        categories: Arc<CategoryTable>,
    ) -> Self {
        Self {
            sources,
            cache,
            categories,
            ttl: DEFAULT_TTL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            upstream_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bounds the accounts and divisions loaded at once, and the upstream fetches in flight.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        self.max_concurrency = max_concurrency;
        self.upstream_permits = Arc::new(Semaphore::new(max_concurrency));
        self
    }

    pub fn sources(&self) -> &[Arc<dyn JournalSource>] {
        &self.sources
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub async fn balance(&self, window: &Window) -> Result<Balance> {
        let accounts = self.load(std::slice::from_ref(window)).await?;
        let mut total = Balance::default();
        for account in &accounts {
            let mut partial = Balance::default();
            for division in account {
                for record in division.slice(0) {
                    partial.record(record.amount);
                }
            }
            total.sum(&partial);
        }
        Ok(total)
    }

    pub async fn balance_by_type(&self, window: &Window) -> Result<BalanceByType> {
        let accounts = self.load(std::slice::from_ref(window)).await?;
        let mut total = BalanceByType::default();
        for account in &accounts {
            let mut partial = BalanceByType::default();
            for division in account {
                for record in division.slice(0) {
                    partial.record(self.categories.category(&record.ref_type), record.amount);
                }
            }
            total.sum(&partial);
        }
        Ok(total)
    }

    /// Totals per division name. Divisions without activity are listed with zero totals.
    pub async fn balance_by_division(&self, window: &Window) -> Result<BalanceByDivision> {
        let accounts = self.load(std::slice::from_ref(window)).await?;
        let mut total = BalanceByDivision::default();
        for account in &accounts {
            let mut partial = BalanceByDivision::default();
            for division in account {
                partial.touch(&division.name);
                for record in division.slice(0) {
                    partial.record(&division.name, record.amount);
                }
            }
            total.sum(&partial);
        }
        Ok(total)
    }

    /// One entry per calendar day of `window`, each listing every division seen.
    pub async fn balance_by_day_by_division_by_type(
        &self,
        window: &Window,
    ) -> Result<Vec<BalanceByDivisionByType>> {
        let (dates, days): (Vec<_>, Vec<_>) = window.split_days().into_iter().unzip();
        let accounts = self.load(&days).await?;

        let names: BTreeSet<&str> = accounts
            .iter()
            .flatten()
            .map(|division| division.name.as_str())
            .collect();
        let empty_series = || -> Vec<BalanceByDivisionByType> {
            dates
                .iter()
                .map(|date| {
                    let mut day = BalanceByDivisionByType::new(*date);
                    names.iter().for_each(|name| day.touch(name));
                    day
                })
                .collect()
        };

        let mut total = empty_series();
        for account in &accounts {
            let mut partial = empty_series();
            for division in account {
                for (index, day) in partial.iter_mut().enumerate() {
                    for record in division.slice(index) {
                        day.record(
                            &division.name,
                            self.categories.category(&record.ref_type),
                            record.amount,
                        );
                    }
                }
            }
            for (day, part) in total.iter_mut().zip(&partial) {
                day.sum(part);
            }
        }
        Ok(total)
    }

    /// Refreshes every division of every account and reads it once per window.
    ///
    /// Results keep source and division order whatever the concurrency, and the
    /// first failure aborts the whole load.
    async fn load(&self, windows: &[Window]) -> Result<Vec<LoadedAccount>> {
        stream::iter(&self.sources)
            .map(|source| self.load_account(source.as_ref(), windows))
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }

    async fn load_account(
        &self,
        source: &dyn JournalSource,
        windows: &[Window],
    ) -> Result<LoadedAccount> {
        let divisions = {
            let _permit = self.upstream_permits.acquire().await.ok();
            source.divisions().await?
        };
        debug!(account = %source.account(), divisions = divisions.len(), "Loading account");

        stream::iter(divisions)
            .map(|division| self.load_division(source, division, windows))
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }

    async fn load_division(
        &self,
        source: &dyn JournalSource,
        division: Division,
        windows: &[Window],
    ) -> Result<LoadedDivision> {
        let account = source.account();
        self.cache
            .refresh_if_stale_limited(
                &account,
                division.id,
                self.ttl,
                &self.upstream_permits,
                || collect_journal(source, &division),
            )
            .await?;

        let mut slices = Vec::with_capacity(windows.len());
        for window in windows {
            slices.push(self.cache.range(&account, division.id, window).await?);
        }
        Ok(LoadedDivision {
            name: division.display_name().to_string(),
            slices,
        })
    }
}
