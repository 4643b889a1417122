use super::aggregator::{DEFAULT_MAX_CONCURRENCY, DEFAULT_TTL};
use super::cache::DEFAULT_REFRESH_TIMEOUT;
use super::notifier::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_NOTIFY_INTERVAL, DEFAULT_THRESHOLD, NotifierSettings,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

/// One authenticated character whose corporation wallets are reported.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccountConfig {
    pub character_id: i64,
    /// Access token given inline.
    pub token: Option<String>,
    /// Name of the environment variable holding the access token.
    pub token_env: Option<String>,
}

impl AccountConfig {
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        let var = self.token_env.as_deref().with_context(|| {
            format!(
                "Account {} needs either `token` or `token_env`",
                self.character_id
            )
        })?;
        std::env::var(var).with_context(|| {
            format!(
                "Environment variable {var} for account {} is not set",
                self.character_id
            )
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EsiProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub esi: Option<EsiProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            esi: Some(EsiProviderConfig {
                base_url: DEFAULT_ESI_BASE_URL.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub refresh_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub check_interval_secs: u64,
    pub notify_interval_secs: u64,
    pub threshold: f64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
            notify_interval_secs: DEFAULT_NOTIFY_INTERVAL.as_secs(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl From<&NotifierConfig> for NotifierSettings {
    fn from(config: &NotifierConfig) -> Self {
        NotifierSettings {
            check_interval: Duration::from_secs(config.check_interval_secs),
            notify_interval: Duration::from_secs(config.notify_interval_secs),
            threshold: config.threshold,
        }
    }
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Extra or replacement ref type to category groupings.
    #[serde(default)]
    pub categories: HashMap<String, String>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("net", "walletbook", "walletbook")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(accounts = config.accounts.len(), "Successfully loaded config");
        Ok(config)
    }

    pub fn esi_base_url(&self) -> &str {
        self.providers
            .esi
            .as_ref()
            .map_or(DEFAULT_ESI_BASE_URL, |p| &p.base_url)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.refresh_timeout_secs)
    }
}
