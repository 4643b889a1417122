//! Report facade with current-month defaults and the monthly threshold check.

use super::aggregator::Aggregator;
use super::balance::{
    Balance, BalanceByDivision, BalanceByDivisionByType, BalanceByType,
    MonthlyBalanceNotification,
};
use super::clock::Clock;
use super::error::Result;
use super::window::Window;
use std::sync::Arc;
use tracing::info;

/// Verdict of [`Accountant::monthly_balance_below_threshold`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCheck {
    pub below: bool,
    pub notification: MonthlyBalanceNotification,
}

pub struct Accountant {
    aggregator: Arc<Aggregator>,
    clock: Arc<dyn Clock>,
}

impl Accountant {
    pub fn new(aggregator: Arc<Aggregator>, clock: Arc<dyn Clock>) -> Self {
        Self { aggregator, clock }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn current_month(&self) -> Window {
        Window::month_of(self.clock.now())
    }

    /// The given window, or the current calendar month.
    pub fn resolve_window(&self, window: Option<Window>) -> Window {
        window.unwrap_or_else(|| self.current_month())
    }

    pub async fn balance(&self, window: Option<Window>) -> Result<Balance> {
        self.aggregator.balance(&self.resolve_window(window)).await
    }

    pub async fn balance_by_division(&self, window: Option<Window>) -> Result<BalanceByDivision> {
        self.aggregator
            .balance_by_division(&self.resolve_window(window))
            .await
    }

    pub async fn balance_by_type(&self, window: Option<Window>) -> Result<BalanceByType> {
        self.aggregator
            .balance_by_type(&self.resolve_window(window))
            .await
    }

    pub async fn balance_by_day_by_division_by_type(
        &self,
        window: Option<Window>,
    ) -> Result<Vec<BalanceByDivisionByType>> {
        self.aggregator
            .balance_by_day_by_division_by_type(&self.resolve_window(window))
            .await
    }

    /// Checks whether the current month's net balance is below `threshold`.
    pub async fn monthly_balance_below_threshold(&self, threshold: f64) -> Result<ThresholdCheck> {
        let window = self.current_month();
        let balance = self.aggregator.balance(&window).await?;
        let below = balance.balance() < threshold;
        info!(
            balance = balance.balance(),
            threshold,
            below,
            "Checked monthly balance {}",
            window.title()
        );
        Ok(ThresholdCheck {
            below,
            notification: MonthlyBalanceNotification {
                threshold,
                balance,
                window,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheStore;
    use crate::core::category::CategoryTable;
    use crate::core::clock::ManualClock;
    use crate::core::error::{AdapterErrorKind, Error};
    use crate::core::source::JournalSource;
    use crate::core::testing::{MockSource, at, record};
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn accountant(source: MockSource) -> Accountant {
        let clock = Arc::new(ManualClock::new(at(20)));
        let cache = CacheStore::new(Arc::new(MemoryStore::new()), clock.clone());
        let aggregator = Aggregator::new(
            vec![Arc::new(source) as Arc<dyn JournalSource>],
            Arc::new(cache),
            Arc::new(CategoryTable::default()),
        );
        Accountant::new(Arc::new(aggregator), clock)
    }

    fn source() -> MockSource {
        let mut february = record(3, 1_000.0, "bounty_prizes", 1);
        february.timestamp = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        MockSource::new(1).with_division(1, "", vec![vec![
            record(1, 100.0, "bounty_prizes", 2),
            record(2, -30.0, "brokers_fee", 31),
            february,
        ]])
    }

    #[test]
    fn test_default_window_is_current_month() {
        let accountant = accountant(MockSource::new(1));
        let window = accountant.resolve_window(None);
        assert_eq!(window.from(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(window.day_count(), 31);

        let explicit = Window::parse("2024-01-01", "2024-01-02").unwrap();
        assert_eq!(accountant.resolve_window(Some(explicit)), explicit);
    }

    #[tokio::test]
    async fn test_reports_default_to_current_month() {
        let accountant = accountant(source());
        let balance = accountant.balance(None).await.unwrap();
        assert_eq!(balance, Balance { income: 100.0, expenses: -30.0 });

        let february = Window::parse("2024-02-01", "2024-02-29").unwrap();
        let earlier = accountant.balance(Some(february)).await.unwrap();
        assert_eq!(earlier.income, 1_000.0);

        let series = accountant
            .balance_by_day_by_division_by_type(None)
            .await
            .unwrap();
        assert_eq!(series.len(), 31);
    }

    #[tokio::test]
    async fn test_threshold_check() {
        let accountant = accountant(source());

        let check = accountant.monthly_balance_below_threshold(1e9).await.unwrap();
        assert!(check.below);
        assert_eq!(check.notification.balance.balance(), 70.0);
        assert_eq!(check.notification.threshold, 1e9);
        assert_eq!(check.notification.window.title(), "for March 2024");

        let check = accountant.monthly_balance_below_threshold(70.0).await.unwrap();
        assert!(!check.below);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let accountant = accountant(
            MockSource::new(1).failing_divisions(AdapterErrorKind::RateLimited("420".into())),
        );
        let err = accountant.balance_by_type(None).await.unwrap_err();
        assert!(matches!(err, Error::Adapter(ref e) if e.is_auth()));
    }
}
