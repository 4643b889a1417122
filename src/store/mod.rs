pub mod disk;
pub mod memory;

use crate::core::error::StoreError;
use crate::core::journal::{AccountId, DivisionId, LedgerRecord};
use crate::core::window::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use disk::DiskStore;
use memory::MemoryStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-division refresh bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub updated_at: Option<DateTime<Utc>>,
}

/// Keyed, time-indexed, transactional storage of division journals.
///
/// Records are keyed by `(account, division, id)`. Writes go through [`commit`],
/// which is all-or-nothing.
///
/// [`commit`]: JournalStore::commit
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Loads the division metadata. The entry is created empty on first access.
    async fn metadata(
        &self,
        account: &AccountId,
        division: DivisionId,
    ) -> Result<CacheMetadata, StoreError>;

    /// Upserts `records` and stamps `updated_at` in a single transaction.
    ///
    /// The stamp never moves backwards; the value actually written is returned.
    async fn commit(
        &self,
        account: &AccountId,
        division: DivisionId,
        records: &[LedgerRecord],
        updated_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Records whose timestamp falls inside `window`, in timestamp order.
    async fn range(
        &self,
        account: &AccountId,
        division: DivisionId,
        window: &Window,
    ) -> Result<Vec<LedgerRecord>, StoreError>;

    async fn count(&self, account: &AccountId, division: DivisionId) -> Result<usize, StoreError>;
}

/// Opens the durable store under `data_path`, or an in-memory one when no path is given.
pub fn open_store(data_path: Option<&Path>) -> Arc<dyn JournalStore> {
    match data_path {
        Some(path) => {
            let journal_dir = path.join("journal");
            match DiskStore::open(&journal_dir) {
                Ok(store) => {
                    info!("Opened journal store at {}", journal_dir.display());
                    return Arc::new(store);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to open journal store, falling back to memory");
                }
            }
            Arc::new(MemoryStore::new())
        }
        None => Arc::new(MemoryStore::new()),
    }
}

/// Stamp written by a commit: the newer of the previous stamp and `now`.
pub(crate) fn next_stamp(previous: CacheMetadata, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.updated_at.map_or(now, |prev| prev.max(now))
}
