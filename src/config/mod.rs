//! Configuration management for the funding rate monitor.
//!
//! Loads settings from an optional config file and `FRM__`-prefixed
//! environment variables, e.g. `FRM__JOIN__MIN_SOURCES=3` or
//! `FRM__EXCHANGES__ENABLED=binance,lighter,hyperliquid`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exchange::ExchangeId;
use crate::funding::{EnabledExchanges, ExcludedSymbols, JoinPolicy};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Venues to poll and how often
    #[serde(default)]
    pub exchanges: ExchangesConfig,
    /// Row inclusion policy
    #[serde(default)]
    pub join: JoinConfig,
    /// Dashboard layout
    #[serde(default)]
    pub display: DisplayConfig,
    /// Lighter funding history view
    #[serde(default)]
    pub history: HistoryConfig,
    /// Cold-start snapshot files
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangesConfig {
    /// Venues shown on the board; order does not matter
    #[serde(default = "default_enabled")]
    pub enabled: Vec<ExchangeId>,
    /// Poll interval in seconds for venues without an override
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Per-venue poll interval overrides, keyed by venue slug
    #[serde(default = "default_refresh_overrides")]
    pub refresh_overrides: HashMap<String, u64>,
    /// Gap between edgeX per-contract requests in milliseconds
    #[serde(default = "default_edgex_fetch_gap_ms")]
    pub edgex_fetch_gap_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Minimum number of venues reporting a symbol for it to get a row
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Table rows per page
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,
    /// Entries in the top spreads panel
    #[serde(default = "default_top_spreads")]
    pub top_spreads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Lookback window in hours
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    /// Maximum points requested per market
    #[serde(default = "default_count_back")]
    pub count_back: u32,
    /// Gap between per-market requests in milliseconds (Lighter allows 60 req/min)
    #[serde(default = "default_history_fetch_gap_ms")]
    pub fetch_gap_ms: u64,
    /// Collection cycle interval in seconds
    #[serde(default = "default_history_refresh_secs")]
    pub refresh_secs: u64,
    /// Symbols hidden from the history view
    #[serde(default)]
    pub excluded_symbols: Vec<String>,
    /// Principal in USD for the history view's projected profit; `--capital`
    /// overrides it
    #[serde(default = "default_principal_usd")]
    pub principal_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory holding the snapshot files
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

// Default value functions
fn default_enabled() -> Vec<ExchangeId> {
    ExchangeId::ALL.to_vec()
}

fn default_refresh_secs() -> u64 {
    300 // 5 minutes
}

fn default_refresh_overrides() -> HashMap<String, u64> {
    // edgeX is fetched contract by contract; a full pass takes minutes
    HashMap::from([(ExchangeId::Edgex.slug().to_string(), 600)])
}

fn default_edgex_fetch_gap_ms() -> u64 {
    500
}

fn default_min_sources() -> usize {
    2
}

fn default_rows_per_page() -> usize {
    20
}

fn default_top_spreads() -> usize {
    10
}

fn default_lookback_hours() -> u32 {
    24 * 7
}

fn default_count_back() -> u32 {
    168 // one point per hour over 7 days
}

fn default_history_fetch_gap_ms() -> u64 {
    1100
}

fn default_history_refresh_secs() -> u64 {
    3600
}

fn default_principal_usd() -> Decimal {
    Decimal::new(1000, 0) // $1000
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Config {
    /// Load configuration from environment variables and config files.
    ///
    /// `path` replaces the default `config.{toml,yaml,json}` lookup and must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("FRM")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("exchanges.enabled")
                    .with_list_parse_key("history.excluded_symbols"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.join.min_sources >= 2,
            "join.min_sources must be at least 2"
        );

        anyhow::ensure!(
            self.enabled_exchanges().len() >= self.join.min_sources,
            "at least join.min_sources ({}) exchanges must be enabled",
            self.join.min_sources
        );

        for key in self.exchanges.refresh_overrides.keys() {
            key.parse::<ExchangeId>()
                .with_context(|| format!("invalid exchanges.refresh_overrides key `{}`", key))?;
        }

        anyhow::ensure!(
            self.exchanges.refresh_secs > 0
                && self.exchanges.refresh_overrides.values().all(|s| *s > 0),
            "exchange refresh intervals must be positive"
        );

        anyhow::ensure!(
            self.display.rows_per_page > 0,
            "display.rows_per_page must be positive"
        );

        anyhow::ensure!(
            self.history.lookback_hours > 0 && self.history.count_back > 0,
            "history.lookback_hours and history.count_back must be positive"
        );

        anyhow::ensure!(
            self.history.refresh_secs > 0,
            "history.refresh_secs must be positive"
        );

        anyhow::ensure!(
            self.history.principal_usd >= Decimal::ZERO,
            "history.principal_usd must not be negative"
        );

        Ok(())
    }

    pub fn enabled_exchanges(&self) -> EnabledExchanges {
        self.exchanges.enabled.iter().copied().collect()
    }

    pub fn join_policy(&self) -> JoinPolicy {
        JoinPolicy {
            min_sources: self.join.min_sources,
        }
    }

    pub fn excluded_symbols(&self) -> ExcludedSymbols {
        ExcludedSymbols::new(&self.history.excluded_symbols)
    }
}

impl ExchangesConfig {
    /// Poll interval for `exchange`.
    pub fn refresh_interval(&self, exchange: ExchangeId) -> Duration {
        let secs = self
            .refresh_overrides
            .get(exchange.slug())
            .copied()
            .unwrap_or(self.refresh_secs);
        Duration::from_secs(secs)
    }

    pub fn edgex_fetch_gap(&self) -> Duration {
        Duration::from_millis(self.edgex_fetch_gap_ms)
    }
}

/// Principal for spread profit estimates. Only an explicit positive
/// `--capital` produces one; the history principal never applies here.
pub fn spread_principal(capital: Option<Decimal>) -> Option<Decimal> {
    capital.filter(|p| *p > Decimal::ZERO)
}

impl HistoryConfig {
    /// `--capital` when given, else `principal_usd`.
    pub fn principal(&self, capital: Option<Decimal>) -> Decimal {
        capital.unwrap_or(self.principal_usd)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookback_hours) * 3600)
    }

    pub fn fetch_gap(&self) -> Duration {
        Duration::from_millis(self.fetch_gap_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl Default for ExchangesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            refresh_secs: default_refresh_secs(),
            refresh_overrides: default_refresh_overrides(),
            edgex_fetch_gap_ms: default_edgex_fetch_gap_ms(),
        }
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            rows_per_page: default_rows_per_page(),
            top_spreads: default_top_spreads(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            count_back: default_count_back(),
            fetch_gap_ms: default_history_fetch_gap_ms(),
            refresh_secs: default_history_refresh_secs(),
            excluded_symbols: Vec::new(),
            principal_usd: default_principal_usd(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
        }
    }
}
