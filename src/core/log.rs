use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Level for our own events: warnings only, so report tables stay readable, or
/// everything down to debug with `--verbose`.
fn app_filter(verbose: bool) -> Targets {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    Targets::new().with_target("walletbook", level)
}

/// Installs the global subscriber. Only `walletbook` events pass unless `RUST_LOG` says otherwise.
///
/// Logs go to stderr so they never mix with the tables printed on stdout.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_filter(verbose))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_app_filter_levels() {
        let quiet = app_filter(false);
        assert!(quiet.would_enable("walletbook::core::cache", &Level::WARN));
        assert!(!quiet.would_enable("walletbook::core::cache", &Level::INFO));
        assert!(!quiet.would_enable("reqwest::connect", &Level::ERROR));

        let verbose = app_filter(true);
        assert!(verbose.would_enable("walletbook::providers::esi", &Level::DEBUG));
        assert!(!verbose.would_enable("walletbook::providers::esi", &Level::TRACE));
    }
}
