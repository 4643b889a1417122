//! Upstream journal capability and pagination.

use super::error::AdapterError;
use super::journal::{AccountId, Division, LedgerRecord};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

/// One page of journal entries plus the page count the upstream reported.
#[derive(Debug, Clone, Default)]
pub struct JournalPage {
    pub records: Vec<LedgerRecord>,
    pub total_pages: u32,
}

/// Anything that can list wallet divisions and serve their journal page by page.
#[async_trait]
pub trait JournalSource: Send + Sync {
    fn account(&self) -> AccountId;

    async fn divisions(&self) -> Result<Vec<Division>, AdapterError>;

    /// Fetches one 1-based page of a division journal.
    async fn journal_page(
        &self,
        division: &Division,
        page: u32,
    ) -> Result<JournalPage, AdapterError>;
}

struct PageCursor {
    next: u32,
    total: Option<u32>,
}

/// Lazy stream over every record of a division journal.
///
/// Pages are requested one after another; the page count is learned from page 1.
/// The stream ends after the first error, which carries the failing page. Calling
/// this again starts over from page 1.
pub fn journal<'a>(
    source: &'a dyn JournalSource,
    division: &'a Division,
) -> BoxStream<'a, Result<LedgerRecord, AdapterError>> {
    let pages = stream::try_unfold(
        PageCursor {
            next: 1,
            total: None,
        },
        move |mut cursor| async move {
            if cursor.total.is_some_and(|total| cursor.next > total) {
                return Ok::<_, AdapterError>(None);
            }
            let page_no = cursor.next;
            let page = source
                .journal_page(division, page_no)
                .await
                .map_err(|e| e.in_division(division.id).on_page(page_no))?;
            let total = *cursor.total.get_or_insert(page.total_pages.max(1));
            debug!(
                account = %source.account(),
                division = division.id,
                page = page_no,
                total,
                records = page.records.len(),
                "Fetched journal page"
            );
            cursor.next += 1;
            Ok::<_, AdapterError>(Some((page.records, cursor)))
        },
    );

    pages
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, AdapterError>)))
        .try_flatten()
        .boxed()
}

/// Drains a division journal; any page failure fails the whole fetch.
pub async fn collect_journal(
    source: &dyn JournalSource,
    division: &Division,
) -> Result<Vec<LedgerRecord>, AdapterError> {
    journal(source, division).try_collect().await
}
