pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use crate::config::AppConfig;
use crate::core::notifier::{LogSink, Notifier, NotifierSettings};
use crate::core::{
    Accountant, Aggregator, CacheStore, CategoryTable, Clock, JournalSource, SystemClock, Window,
};
use crate::providers::{EsiSource, StaticToken};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// A command dispatched by [`run_command`]. Report windows default to the current month.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Balance(Option<Window>),
    ByDivision(Option<Window>),
    ByType(Option<Window>),
    Daily(Option<Window>),
    /// Threshold check; the configured threshold is used when none is given.
    Check { threshold: Option<f64> },
    Watch,
    Status,
}

/// Parses an optional `--from`/`--to` pair of `YYYY-MM-DD` dates.
pub fn parse_window(from: Option<&str>, to: Option<&str>) -> Result<Option<Window>> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => Ok(Some(Window::parse(from, to)?)),
        _ => anyhow::bail!("Both --from and --to are needed for a custom window"),
    }
}

/// Wires the ESI sources, the journal store and the cache into a report facade.
pub async fn build_accountant(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Accountant> {
    let mut sources: Vec<Arc<dyn JournalSource>> = Vec::with_capacity(config.accounts.len());
    for account in &config.accounts {
        let token = account.resolve_token()?;
        let source = EsiSource::connect(
            config.esi_base_url(),
            account.character_id,
            Arc::new(StaticToken::new(token)),
        )
        .await
        .with_context(|| format!("Failed to connect character {}", account.character_id))?;
        sources.push(Arc::new(source));
    }

    let data_path = config.default_data_path()?;
    let store = store::open_store(Some(&data_path));
    let cache = CacheStore::new(store, Arc::clone(&clock)).with_refresh_timeout(config.refresh_timeout());
    let categories = CategoryTable::with_overrides(&config.categories);
    debug!(categories = categories.len(), "Built category table");

    let aggregator = Aggregator::new(sources, Arc::new(cache), Arc::new(categories))
        .with_ttl(config.ttl())
        .with_max_concurrency(config.max_concurrency);
    Ok(Accountant::new(Arc::new(aggregator), clock))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("walletbook starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let accountant = build_accountant(&config, Arc::clone(&clock)).await?;

    match command {
        AppCommand::Balance(window) => cli::report::balance(&accountant, window).await,
        AppCommand::ByDivision(window) => cli::report::by_division(&accountant, window).await,
        AppCommand::ByType(window) => cli::report::by_type(&accountant, window).await,
        AppCommand::Daily(window) => cli::report::daily(&accountant, window).await,
        AppCommand::Check { threshold } => {
            let threshold = threshold.unwrap_or(config.notifier.threshold);
            cli::report::check(&accountant, threshold).await
        }
        AppCommand::Status => cli::report::status(accountant.aggregator()).await,
        AppCommand::Watch => {
            let notifier = Notifier::new(
                Arc::new(accountant),
                Arc::new(LogSink),
                clock,
                NotifierSettings::from(&config.notifier),
            );
            notifier
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    }
                })
                .await;
            Ok(())
        }
    }
}
