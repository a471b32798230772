//! Simulator configuration.
//!
//! Every policy constant has a default here. A TOML file named on the command
//! line overrides the defaults, and `PAPERTRADE__<SECTION>__<KEY>` environment
//! variables override the file.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PAPERTRADE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub log_level: String,
    pub market: MarketConfig,
    pub fetcher: FetcherConfig,
    pub leaderboard: LeaderboardConfig,
    pub accounts: AccountsConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            market: MarketConfig::default(),
            fetcher: FetcherConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            accounts: AccountsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Allow-list of tradable symbols. Empty means every symbol.
    pub symbols: Vec<String>,
    /// Age past which a quote counts as "market closed".
    pub staleness_secs: u64,
    pub heartbeat_secs: u64,
    /// Buffered messages per quote channel before slow subscribers lag.
    pub channel_capacity: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string(), "BINANCE:BTCUSDT".to_string()],
            staleness_secs: 1800,
            heartbeat_secs: 15,
            channel_capacity: 64,
        }
    }
}

impl MarketConfig {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Pause between two requests of the same provider group.
    pub request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub history_timeout_ms: u64,
    pub history_queue_capacity: usize,
    /// CSV history file. History is kept in memory when unset.
    pub history_path: Option<PathBuf>,
    /// Source of symbols without a registered `TAG:` prefix.
    pub default_source: String,
    pub providers: Vec<ProviderConfig>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 3000,
            request_timeout_ms: 5000,
            history_timeout_ms: 2000,
            history_queue_capacity: 1024,
            history_path: None,
            default_source: "FH".to_string(),
            providers: vec![
                ProviderConfig::new("FH", 150.0),
                ProviderConfig::new("CG", 60000.0),
            ],
        }
    }
}

impl FetcherConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    /// Inter-request delay of the group served by `provider`.
    pub fn delay_for(&self, provider: &ProviderConfig) -> Duration {
        Duration::from_millis(provider.request_delay_ms.unwrap_or(self.request_delay_ms))
    }

    pub fn provider(&self, source: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.source == source)
    }
}

/// Synthetic provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub source: String,
    pub start_price: f64,
    /// Largest relative move per tick.
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Overrides `fetcher.request_delay_ms` for this provider's group.
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
}

fn default_volatility() -> f64 {
    0.01
}

impl ProviderConfig {
    pub fn new(source: impl Into<String>, start_price: f64) -> Self {
        Self {
            source: source.into(),
            start_price,
            volatility: default_volatility(),
            request_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub refresh_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self { refresh_secs: 600 }
    }
}

impl LeaderboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub initial_balance: Decimal,
    /// Accounts registered at startup.
    pub seed: Vec<SeedAccount>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(10_000),
            seed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl SimulatorConfig {
    /// Loads defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(env.separator("__").try_parsing(true));

        let settings = builder
            .build()
            .with_context(|| format!("Failed to read configuration {:?}", path))?;
        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults() {
        let config = SimulatorConfig::load_with(None, no_env()).unwrap();
        assert_eq!(config.market.staleness_window(), Duration::from_secs(1800));
        assert_eq!(config.leaderboard.refresh_interval(), Duration::from_secs(600));
        assert_eq!(config.fetcher.request_delay(), Duration::from_millis(3000));
        assert_eq!(config.fetcher.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.fetcher.history_queue_capacity, 1024);
        assert_eq!(config.accounts.initial_balance, Decimal::from(10_000));
        assert_eq!(config.market.symbols, vec!["AAPL", "BINANCE:BTCUSDT"]);
        let cg = config.fetcher.provider("CG").unwrap();
        assert_eq!(config.fetcher.delay_for(cg), Duration::from_millis(3000));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[market]
symbols = ["AAPL", "CG:bitcoin"]
staleness_secs = 60

[accounts]
initial_balance = "2500.50"

[[accounts.seed]]
username = "ada"
first_name = "Ada"
"#
        )
        .unwrap();

        let config = SimulatorConfig::load_with(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.market.staleness_secs, 60);
        assert_eq!(config.market.heartbeat_secs, 15);
        assert_eq!(config.accounts.initial_balance.to_string(), "2500.50");
        assert_eq!(config.accounts.seed[0].username, "ada");
        assert_eq!(config.fetcher.providers.len(), 2);
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = HashMap::from([
            ("PAPERTRADE__LEADERBOARD__REFRESH_SECS".to_string(), "30".to_string()),
            ("PAPERTRADE__FETCHER__REQUEST_DELAY_MS".to_string(), "10".to_string()),
        ]);
        let config = SimulatorConfig::load_with(
            None,
            Environment::with_prefix(ENV_PREFIX).source(Some(env)),
        )
        .unwrap();
        assert_eq!(config.leaderboard.refresh_secs, 30);
        assert_eq!(config.fetcher.request_delay_ms, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(SimulatorConfig::load_with(Some(Path::new("/nonexistent/sim.toml")), no_env()).is_err());
    }
}
