use super::{CacheMetadata, JournalStore, next_stamp};
use crate::core::error::StoreError;
use crate::core::journal::{AccountId, DivisionId, LedgerRecord};
use crate::core::window::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone, Default)]
struct DivisionJournal {
    metadata: CacheMetadata,
    records: HashMap<i64, LedgerRecord>,
    by_time: BTreeSet<(DateTime<Utc>, i64)>,
}

impl DivisionJournal {
    fn upsert(&mut self, record: &LedgerRecord) {
        if let Some(previous) = self.records.insert(record.id, record.clone()) {
            self.by_time.remove(&(previous.timestamp, previous.id));
        }
        self.by_time.insert((record.timestamp, record.id));
    }
}

/// In-memory journal store, used for tests and runs without a data directory.
pub struct MemoryStore {
    inner: Mutex<HashMap<(AccountId, DivisionId), DivisionJournal>>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Makes every following commit fail until reset, to exercise rollback paths.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn metadata(
        &self,
        account: &AccountId,
        division: DivisionId,
    ) -> Result<CacheMetadata, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.entry((*account, division)).or_default().metadata)
    }

    async fn commit(
        &self,
        account: &AccountId,
        division: DivisionId,
        records: &[LedgerRecord],
        updated_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut inner = self.inner.lock().await;
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commits disabled".to_string()));
        }

        // Stage on a copy so the visible state only changes once everything applied.
        let mut staged = inner
            .get(&(*account, division))
            .cloned()
            .unwrap_or_default();
        for record in records {
            staged.upsert(record);
        }
        let stamp = next_stamp(staged.metadata, updated_at);
        staged.metadata.updated_at = Some(stamp);
        inner.insert((*account, division), staged);

        debug!(%account, division, records = records.len(), "Memory store COMMIT");
        Ok(stamp)
    }

    async fn range(
        &self,
        account: &AccountId,
        division: DivisionId,
        window: &Window,
    ) -> Result<Vec<LedgerRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(journal) = inner.get(&(*account, division)) else {
            return Ok(Vec::new());
        };
        journal
            .by_time
            .range((window.from(), i64::MIN)..=(window.to(), i64::MAX))
            .map(|(_, id)| {
                journal
                    .records
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupt(format!("index points at missing record {id}")))
            })
            .collect()
    }

    async fn count(&self, account: &AccountId, division: DivisionId) -> Result<usize, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(&(*account, division))
            .map_or(0, |journal| journal.records.len()))
    }
}
