//! Configuration file support.
//!
//! Every key has a default, so an empty or partial TOML file is valid.

use crate::data::{CsvCache, DEFAULT_DATA_DIR, DEFAULT_EXTENSION};
use crate::error::{Result, StockError};
use crate::quotes::{
    GoogleClient, HistorySource, QuoteSource, YahooClient, DEFAULT_GOOGLE_URL, DEFAULT_YAHOO_URL,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache settings.
    #[serde(default)]
    pub data: DataSettings,
    /// Quote provider settings.
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Values handed to the backtesting engine.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Strategy parameters.
    #[serde(default)]
    pub strategy: StrategySettings,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Cache root directory.
    #[serde(default = "default_data_dir")]
    pub dir: String,
    /// Cache file extension.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_data_dir() -> String { DEFAULT_DATA_DIR.to_string() }
fn default_extension() -> String { DEFAULT_EXTENSION.to_string() }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            extension: default_extension(),
        }
    }
}

impl DataSettings {
    pub fn cache(&self) -> CsvCache {
        CsvCache::new(&self.dir, self.extension.as_str())
    }
}

/// Provider used for live quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSourceKind {
    Google,
    #[default]
    Yahoo,
}

/// Quote provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Live quote provider; history always comes from Yahoo.
    #[serde(default)]
    pub quote_source: QuoteSourceKind,
    #[serde(default = "default_yahoo_url")]
    pub yahoo_url: String,
    #[serde(default = "default_google_url")]
    pub google_url: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_yahoo_url() -> String { DEFAULT_YAHOO_URL.to_string() }
fn default_google_url() -> String { DEFAULT_GOOGLE_URL.to_string() }
fn default_timeout() -> u64 { 30 }
fn default_user_agent() -> String { concat!("tomastocks/", env!("CARGO_PKG_VERSION")).to_string() }

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            quote_source: QuoteSourceKind::default(),
            yahoo_url: default_yahoo_url(),
            google_url: default_google_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProviderSettings {
    /// Build the configured live quote provider.
    pub fn quote_source(&self) -> Result<Box<dyn QuoteSource>> {
        Ok(match self.quote_source {
            QuoteSourceKind::Google => Box::new(GoogleClient::with_base_url(
                &self.google_url,
                self.timeout_secs,
                &self.user_agent,
            )?),
            QuoteSourceKind::Yahoo => Box::new(self.yahoo()?),
        })
    }

    /// Build the history provider.
    pub fn history_source(&self) -> Result<Box<dyn HistorySource>> {
        Ok(Box::new(self.yahoo()?))
    }

    fn yahoo(&self) -> Result<YahooClient> {
        YahooClient::with_base_url(&self.yahoo_url, self.timeout_secs, &self.user_agent)
    }
}

/// Values handed to the backtesting engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Start date used when none is given on the command line.
    #[serde(default = "default_start")]
    pub default_start: String,
    /// Starting cash.
    #[serde(default = "default_cash")]
    pub cash: f64,
    /// Commission rate per trade (0.05 = 5%).
    #[serde(default = "default_commission")]
    pub commission: f64,
}

fn default_start() -> String { "2014-01-24".to_string() }
fn default_cash() -> f64 { 10_000.0 }
fn default_commission() -> f64 { 0.05 }

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            default_start: default_start(),
            cash: default_cash(),
            commission: default_commission(),
        }
    }
}

/// Strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Reference moving average period.
    #[serde(default = "default_ma_period")]
    pub ma_period: usize,
    /// Default sizer stake.
    #[serde(default = "default_stake")]
    pub stake: u32,
    /// Shares per order.
    #[serde(default = "default_order_size")]
    pub order_size: f64,
}

fn default_ma_period() -> usize { 15 }
fn default_stake() -> u32 { 10 }
fn default_order_size() -> f64 { 100.0 }

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            ma_period: default_ma_period(),
            stake: default_stake(),
            order_size: default_order_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StockError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.data.dir.trim().is_empty() {
            return Err(StockError::ConfigError("data.dir is empty".to_string()));
        }
        if self.data.extension.is_empty() || self.data.extension.contains(['/', '\\', '.']) {
            return Err(StockError::ConfigError(format!(
                "data.extension '{}' is not a bare extension",
                self.data.extension
            )));
        }
        if self.provider.timeout_secs == 0 {
            return Err(StockError::ConfigError(
                "provider.timeout_secs must be positive".to_string(),
            ));
        }
        if self.backtest.cash <= 0.0 {
            return Err(StockError::ConfigError("backtest.cash must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.backtest.commission) {
            return Err(StockError::ConfigError(
                "backtest.commission must be in [0, 1)".to_string(),
            ));
        }
        if self.strategy.order_size <= 0.0 {
            return Err(StockError::ConfigError(
                "strategy.order_size must be positive".to_string(),
            ));
        }
        crate::dates::str_to_date(self.backtest.default_start.as_str())?;
        Ok(())
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# tomastocks configuration

[data]
dir = "data"          # cache root: <dir>/<SYMBOL>/<SYMBOL>_<start>_to_<end>.<extension>
extension = "txt"

[provider]
quote_source = "yahoo"  # or "google"
yahoo_url = "https://query1.finance.yahoo.com"
google_url = "https://finance.google.com"
timeout_secs = 30

[backtest]
default_start = "2014-01-24"
cash = 10000.0
commission = 0.05

[strategy]
ma_period = 15
stake = 10
order_size = 100.0
"#
        .to_string()
    }
}
