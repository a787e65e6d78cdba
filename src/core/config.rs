use crate::core::clock::SessionEvent;
use crate::core::currency::Currency;
use crate::providers::util::DEFAULT_TIMEOUT;
use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Daily closes from the Yahoo chart API.
    Yahoo,
    /// Real-time price and 24h change from CoinGecko.
    #[serde(rename = "coingecko")]
    CoinGecko,
    /// Real-time last price and delta from Tradegate.
    Tradegate,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumberLocale {
    /// `1,234.56`
    #[default]
    En,
    /// `1.234,56`
    De,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OtcVenueConfig {
    pub url: String,
    /// Text preceding the price on the page, e.g. "Letzter Kurs".
    pub label: String,
    #[serde(default)]
    pub locale: NumberLocale,
    pub currency: Currency,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub source: SourceKind,
    /// Native currency for real-time sources that do not report one.
    pub currency: Option<Currency>,
    /// Currency the status line converts into.
    pub display_currency: Option<Currency>,
    pub otc: Option<OtcVenueConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub venue: String,
    pub timezone: String,
    #[serde(default)]
    pub roll_over_weekends: bool,
    pub events: Vec<SessionEvent>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateHostConfig {
    pub base_url: String,
    pub access_key: Option<String>,
    /// Locale of string rates; guessed per value when unset.
    #[serde(default)]
    pub locale: Option<NumberLocale>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<ProviderEndpoint>,
    pub coingecko: Option<ProviderEndpoint>,
    pub tradegate: Option<ProviderEndpoint>,
    pub exchangerate_host: Option<ExchangeRateHostConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(ProviderEndpoint {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            coingecko: Some(ProviderEndpoint {
                base_url: "https://api.coingecko.com".to_string(),
            }),
            tradegate: Some(ProviderEndpoint {
                base_url: "https://www.tradegate.de".to_string(),
            }),
            exchangerate_host: Some(ExchangeRateHostConfig {
                base_url: "https://api.exchangerate.host".to_string(),
                access_key: None,
                locale: None,
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn yahoo_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn coingecko_url(&self) -> &str {
        self.coingecko
            .as_ref()
            .map_or("https://api.coingecko.com", |p| &p.base_url)
    }

    pub fn tradegate_url(&self) -> &str {
        self.tradegate
            .as_ref()
            .map_or("https://www.tradegate.de", |p| &p.base_url)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    15
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModerationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_audit_channel")]
    pub audit_channel: String,
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

fn default_audit_channel() -> String {
    "mod-log".to_string()
}

fn default_admin_roles() -> Vec<String> {
    vec!["Moderator".to_string(), "Admin".to_string()]
}

fn default_store_file() -> String {
    "banned_phrases.json".to_string()
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            audit_channel: default_audit_channel(),
            admin_roles: default_admin_roles(),
            store_file: default_store_file(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_trigger_words")]
    pub trigger_words: Vec<String>,
    pub compare_channel: Option<String>,
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_trigger_words() -> Vec<String> {
    ["wen", "when", "schedule", "next"]
        .iter()
        .map(|w| w.to_string())
        .collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            trigger_words: default_trigger_words(),
            compare_channel: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tickerbot", "tickerbot")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "tickerbot", "tickerbot")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn moderation_store_path(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join(&self.moderation.store_file))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Rejects values that would stop the broadcast loop at runtime.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.broadcast.interval_secs > 0,
            "broadcast.interval_secs must be greater than zero"
        );
        ensure!(
            self.broadcast.request_timeout_secs > 0,
            "broadcast.request_timeout_secs must be greater than zero"
        );
        Ok(())
    }
}
