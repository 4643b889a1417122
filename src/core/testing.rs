//! In-memory journal source and record helpers for unit tests.

use super::error::{AdapterError, AdapterErrorKind};
use super::journal::{AccountId, Division, DivisionId, LedgerRecord};
use super::source::{JournalPage, JournalSource};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Noon UTC on the given day of March 2024.
pub(crate) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub(crate) fn record(id: i64, amount: f64, ref_type: &str, day: u32) -> LedgerRecord {
    let mut record = LedgerRecord::new(id, amount, ref_type, at(day));
    record.balance = 1_000.0 + amount;
    record
}

pub(crate) struct MockSource {
    account: AccountId,
    divisions: Vec<Division>,
    pages: Mutex<HashMap<DivisionId, Vec<Vec<LedgerRecord>>>>,
    failure: Mutex<Option<(DivisionId, u32, AdapterErrorKind)>>,
    divisions_failure: Option<AdapterErrorKind>,
    delay: Option<Duration>,
    page_calls: AtomicUsize,
    fetches: AtomicUsize,
}

impl MockSource {
    pub(crate) fn new(corporation_id: i64) -> Self {
        Self {
            account: AccountId::new(corporation_id * 10, corporation_id),
            divisions: Vec::new(),
            pages: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            divisions_failure: None,
            delay: None,
            page_calls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_division(
        mut self,
        id: DivisionId,
        name: &str,
        pages: Vec<Vec<LedgerRecord>>,
    ) -> Self {
        self.divisions.push(Division::new(id, name));
        self.pages.lock().unwrap().insert(id, pages);
        self
    }

    pub(crate) fn failing_on(self, division: DivisionId, page: u32, kind: AdapterErrorKind) -> Self {
        *self.failure.lock().unwrap() = Some((division, page, kind));
        self
    }

    pub(crate) fn failing_divisions(mut self, kind: AdapterErrorKind) -> Self {
        self.divisions_failure = Some(kind);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_pages(&self, division: DivisionId, pages: Vec<Vec<LedgerRecord>>) {
        self.pages.lock().unwrap().insert(division, pages);
    }

    pub(crate) fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Number of journal downloads started (requests for page 1).
    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JournalSource for MockSource {
    fn account(&self) -> AccountId {
        self.account
    }

    async fn divisions(&self) -> Result<Vec<Division>, AdapterError> {
        if let Some(kind) = &self.divisions_failure {
            return Err(AdapterError::new(self.account, kind.clone()));
        }
        Ok(self.divisions.clone())
    }

    async fn journal_page(
        &self,
        division: &Division,
        page: u32,
    ) -> Result<JournalPage, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if page == 1 {
            self.fetches.fetch_add(1, Ordering::SeqCst);
        }
        if let Some((failing_division, failing_page, kind)) = &*self.failure.lock().unwrap() {
            if *failing_division == division.id && *failing_page == page {
                return Err(AdapterError::new(self.account, kind.clone()));
            }
        }
        let pages = self.pages.lock().unwrap();
        let journal = pages.get(&division.id).ok_or_else(|| {
            AdapterError::new(
                self.account,
                AdapterErrorKind::NotFound(format!("division {}", division.id)),
            )
        })?;
        Ok(JournalPage {
            records: journal
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default(),
            total_pages: journal.len().max(1) as u32,
        })
    }
}
