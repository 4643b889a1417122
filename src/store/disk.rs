use super::{CacheMetadata, JournalStore, next_stamp};
use crate::core::error::StoreError;
use crate::core::journal::{AccountId, DivisionId, LedgerRecord};
use crate::core::window::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, PartitionCreateOptions, PersistMode, TxKeyspace, TxPartitionHandle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const METADATA_TAG: u8 = b'm';
const RECORD_TAG: u8 = b'r';
const TIME_INDEX_TAG: u8 = b't';

/// Order-preserving big endian encoding of a signed integer.
fn sortable_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_sortable_i64(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

fn division_prefix(tag: u8, division: DivisionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(tag);
    key.extend_from_slice(&((division as u32) ^ (1 << 31)).to_be_bytes());
    key
}

fn metadata_key(division: DivisionId) -> Vec<u8> {
    division_prefix(METADATA_TAG, division)
}

fn record_key(division: DivisionId, id: i64) -> Vec<u8> {
    let mut key = division_prefix(RECORD_TAG, division);
    key.extend_from_slice(&sortable_i64(id));
    key
}

fn time_index_key(division: DivisionId, timestamp: DateTime<Utc>, id: i64) -> Vec<u8> {
    let mut key = division_prefix(TIME_INDEX_TAG, division);
    key.extend_from_slice(&sortable_i64(timestamp.timestamp_micros()));
    key.extend_from_slice(&sortable_i64(id));
    key
}

/// Journal store on a transactional fjall keyspace.
///
/// Each account lives in its own partition. Inside it, a division owns three key
/// families: its metadata entry, its records keyed by id, and a timestamp index
/// whose keys end with the record id.
pub struct DiskStore {
    keyspace: TxKeyspace,
    partitions: Mutex<HashMap<AccountId, TxPartitionHandle>>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let keyspace = Config::new(path).open_transactional()?;
        Ok(Self {
            keyspace,
            partitions: Mutex::new(HashMap::new()),
        })
    }

    fn partition(&self, account: &AccountId) -> Result<TxPartitionHandle, StoreError> {
        let mut partitions = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(partition) = partitions.get(account) {
            return Ok(partition.clone());
        }
        let name = format!(
            "journal_{}_{}",
            account.corporation_id, account.character_id
        );
        let partition = self
            .keyspace
            .open_partition(&name, PartitionCreateOptions::default())?;
        partitions.insert(*account, partition.clone());
        Ok(partition)
    }
}

#[async_trait]
impl JournalStore for DiskStore {
    async fn metadata(
        &self,
        account: &AccountId,
        division: DivisionId,
    ) -> Result<CacheMetadata, StoreError> {
        let partition = self.partition(account)?;
        let key = metadata_key(division);
        if let Some(value) = self.keyspace.read_tx().get(&partition, &key)? {
            return Ok(serde_json::from_slice(&value)?);
        }

        let metadata = CacheMetadata::default();
        let mut tx = self.keyspace.write_tx();
        // A concurrent commit may have created it in the meantime.
        if let Some(value) = tx.get(&partition, &key)? {
            return Ok(serde_json::from_slice(&value)?);
        }
        tx.insert(&partition, key, serde_json::to_vec(&metadata)?);
        tx.commit()?;
        debug!(%account, division, "Created journal metadata");
        Ok(metadata)
    }

    async fn commit(
        &self,
        account: &AccountId,
        division: DivisionId,
        records: &[LedgerRecord],
        updated_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let partition = self.partition(account)?;
        // Dropping the transaction on any early return discards every staged write.
        let mut tx = self.keyspace.write_tx();

        for record in records {
            let key = record_key(division, record.id);
            if let Some(previous) = tx.get(&partition, &key)? {
                let previous: LedgerRecord = serde_json::from_slice(&previous)?;
                if previous.timestamp != record.timestamp {
                    tx.remove(
                        &partition,
                        time_index_key(division, previous.timestamp, previous.id),
                    );
                }
            }
            tx.insert(&partition, key, serde_json::to_vec(record)?);
            tx.insert(
                &partition,
                time_index_key(division, record.timestamp, record.id),
                Vec::<u8>::new(),
            );
        }

        let previous = match tx.get(&partition, metadata_key(division))? {
            Some(value) => serde_json::from_slice(&value)?,
            None => CacheMetadata::default(),
        };
        let stamp = next_stamp(previous, updated_at);
        let metadata = CacheMetadata {
            updated_at: Some(stamp),
        };
        tx.insert(&partition, metadata_key(division), serde_json::to_vec(&metadata)?);
        tx.commit()?;
        self.keyspace.persist(PersistMode::Buffer)?;

        debug!(%account, division, records = records.len(), "Disk store COMMIT");
        Ok(stamp)
    }

    async fn range(
        &self,
        account: &AccountId,
        division: DivisionId,
        window: &Window,
    ) -> Result<Vec<LedgerRecord>, StoreError> {
        let partition = self.partition(account)?;
        let tx = self.keyspace.read_tx();
        let low = time_index_key(division, window.from(), i64::MIN);
        let high = time_index_key(division, window.to(), i64::MAX);

        let mut records = Vec::new();
        for item in tx.range(&partition, low..=high) {
            let (key, _) = item?;
            let id = decode_sortable_i64(&key[key.len() - 8..])
                .ok_or_else(|| StoreError::Corrupt("short time index key".to_string()))?;
            let value = tx
                .get(&partition, record_key(division, id))?
                .ok_or_else(|| StoreError::Corrupt(format!("index points at missing record {id}")))?;
            let record: LedgerRecord = serde_json::from_slice(&value)?;
            // The index has microsecond resolution; the window bounds do not.
            if window.contains(record.timestamp) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn count(&self, account: &AccountId, division: DivisionId) -> Result<usize, StoreError> {
        let partition = self.partition(account)?;
        let tx = self.keyspace.read_tx();
        let mut count = 0;
        for item in tx.prefix(&partition, division_prefix(RECORD_TAG, division)) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
