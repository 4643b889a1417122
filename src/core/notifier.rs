//! Background monthly balance checks.

use super::accountant::Accountant;
use super::balance::MonthlyBalanceNotification;
use super::clock::Clock;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_THRESHOLD: f64 = 1_000_000_000.0;
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Receives notifications when the monthly balance falls below the threshold.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &MonthlyBalanceNotification) -> anyhow::Result<()>;
}

/// Writes notifications to the log.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &MonthlyBalanceNotification) -> anyhow::Result<()> {
        warn!(
            "Monthly balance {}: {:.2} < {:.2} (income {:.2}, expenses {:.2})",
            notification.window.title(),
            notification.balance.balance(),
            notification.threshold,
            notification.balance.income,
            notification.balance.expenses,
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotifierSettings {
    pub check_interval: Duration,
    pub notify_interval: Duration,
    pub threshold: f64,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

pub struct Notifier {
    accountant: Arc<Accountant>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    settings: NotifierSettings,
    check_timeout: Duration,
    last_check: Option<DateTime<Utc>>,
}

impl Notifier {
    pub fn new(
        accountant: Arc<Accountant>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            accountant,
            sink,
            clock,
            settings,
            check_timeout: CHECK_TIMEOUT,
            last_check: None,
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    /// Ticks once right away and then every check interval until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future) {
        info!(
            check_interval = ?self.settings.check_interval,
            notify_interval = ?self.settings.notify_interval,
            threshold = self.settings.threshold,
            "Notifier started"
        );
        let period = self.settings.check_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        result = self.tick() => {
                            if let Err(e) = result {
                                error!(error = %format!("{e:#}"), "Notifier check failed");
                            }
                        }
                        _ = &mut shutdown => {
                            info!("Notifier stopped, abandoning the running check");
                            return;
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Notifier stopped");
                    return;
                }
            }
        }
    }

    /// Runs the threshold check unless one succeeded within the notify interval.
    ///
    /// Returns whether a notification was sent. A failed check leaves the mark alone,
    /// so the next tick tries again.
    pub async fn tick(&mut self) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let notify_interval =
            TimeDelta::from_std(self.settings.notify_interval).unwrap_or(TimeDelta::MAX);
        if let Some(last) = self.last_check {
            if last
                .checked_add_signed(notify_interval)
                .is_none_or(|due| now <= due)
            {
                debug!(%last, "Skipping check, notify interval not elapsed");
                return Ok(false);
            }
        }

        let check = tokio::time::timeout(
            self.check_timeout,
            self.accountant
                .monthly_balance_below_threshold(self.settings.threshold),
        )
        .await
        .context("Monthly balance check timed out")?
        .context("Monthly balance check failed")?;

        if check.below {
            self.sink
                .send(&check.notification)
                .await
                .context("Failed to send notification")?;
        }
        self.last_check = Some(now);
        Ok(check.below)
    }
}
