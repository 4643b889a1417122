//! Error types shared by the cache, aggregator and reporting layers.

use super::journal::{AccountId, DivisionId};
use std::time::Duration;
use thiserror::Error;

/// Classification of an upstream failure.
#[derive(Debug, Clone, Error)]
pub enum AdapterErrorKind {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Upstream fetch failure with the account, division and page it happened on.
#[derive(Debug, Clone, Error)]
#[error("upstream error for {account}{}{}: {kind}", fmt_division(.division), fmt_page(.page))]
pub struct AdapterError {
    pub account: AccountId,
    pub division: Option<DivisionId>,
    pub page: Option<u32>,
    pub kind: AdapterErrorKind,
}

fn fmt_division(division: &Option<DivisionId>) -> String {
    division.map_or(String::new(), |d| format!(", division {d}"))
}

fn fmt_page(page: &Option<u32>) -> String {
    page.map_or(String::new(), |p| format!(", page {p}"))
}

impl AdapterError {
    pub fn new(account: AccountId, kind: AdapterErrorKind) -> Self {
        Self {
            account,
            division: None,
            page: None,
            kind,
        }
    }

    pub fn in_division(mut self, division: DivisionId) -> Self {
        self.division = Some(division);
        self
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Authentication and rate limit failures; retrying them makes things worse.
    pub fn is_auth(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::Unauthorized(_) | AdapterErrorKind::RateLimited(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.kind, AdapterErrorKind::Transient(_))
    }
}

/// Local persistence failure. The failed transaction is never committed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] fjall::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid window: start {from} is after end {to}")]
    InvertedWindow { from: String, to: String },
    #[error("invalid date '{0}', use YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("store error for {account}, division {division}: {source}")]
    Store {
        account: AccountId,
        division: DivisionId,
        #[source]
        source: StoreError,
    },
    #[error("refresh of {account}, division {division} timed out after {timeout:?}")]
    Timeout {
        account: AccountId,
        division: DivisionId,
        timeout: Duration,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
