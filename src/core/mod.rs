//! Wallet journal caching, aggregation and reporting

pub mod accountant;
pub mod aggregator;
pub mod balance;
pub mod cache;
pub mod category;
pub mod clock;
pub mod config;
pub mod error;
pub mod journal;
pub mod log;
pub mod notifier;
pub mod source;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for cleaner imports
pub use accountant::{Accountant, ThresholdCheck};
pub use aggregator::Aggregator;
pub use balance::{
    Balance, BalanceByDivision, BalanceByDivisionByType, BalanceByType,
    MonthlyBalanceNotification,
};
pub use cache::{CacheStore, RefreshOutcome};
pub use category::CategoryTable;
pub use clock::{Clock, SystemClock};
pub use error::{AdapterError, AdapterErrorKind, Error, StoreError, ValidationError};
pub use journal::{AccountId, Division, DivisionId, LedgerRecord};
pub use source::{JournalPage, JournalSource};
pub use window::Window;
