//! Venue-agnostic traits for funding data providers.
//!
//! Every venue adapter yields already-normalized [`FundingQuote`]s so the join
//! and ranking steps never see venue-specific units or symbol spellings.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::funding::{FundingQuote, MarketRef, RawHistoryPoint};

/// Venue identifier.
///
/// Declaration order is the fixed priority order: arbitrage pairs are named
/// `first-second` in this order and high/low ties resolve to the earlier venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Lighter,
    Hyperliquid,
    Edgex,
    Grvt,
    Aster,
}

impl ExchangeId {
    /// All venues in priority order.
    pub const ALL: [ExchangeId; 6] = [
        ExchangeId::Binance,
        ExchangeId::Lighter,
        ExchangeId::Hyperliquid,
        ExchangeId::Edgex,
        ExchangeId::Grvt,
        ExchangeId::Aster,
    ];

    /// Short code for display (2-3 chars).
    pub fn short_code(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "BN",
            ExchangeId::Lighter => "LT",
            ExchangeId::Hyperliquid => "HL",
            ExchangeId::Edgex => "EX",
            ExchangeId::Grvt => "GR",
            ExchangeId::Aster => "AS",
        }
    }

    /// Lower-case identifier used in config files and snapshot keys.
    pub fn slug(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Lighter => "lighter",
            ExchangeId::Hyperliquid => "hyperliquid",
            ExchangeId::Edgex => "edgex",
            ExchangeId::Grvt => "grvt",
            ExchangeId::Aster => "aster",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeId::Binance => write!(f, "Binance"),
            ExchangeId::Lighter => write!(f, "Lighter"),
            ExchangeId::Hyperliquid => write!(f, "Hyperliquid"),
            ExchangeId::Edgex => write!(f, "edgeX"),
            ExchangeId::Grvt => write!(f, "GRVT"),
            ExchangeId::Aster => write!(f, "Aster"),
        }
    }
}

impl FromStr for ExchangeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        ExchangeId::ALL
            .into_iter()
            .find(|id| id.slug() == lower)
            .ok_or_else(|| anyhow::anyhow!("unknown exchange `{}`", s))
    }
}

/// Trait for venues that provide current funding rates.
///
/// Implementations drop entries that fail validation instead of failing the
/// whole batch; an `Err` means the venue could not be read at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Returns the venue identifier.
    fn exchange(&self) -> ExchangeId;

    /// Fetch every perpetual's funding rate, normalized to an 8h basis.
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>>;
}

/// Time window for a funding history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Inclusive start, milliseconds since epoch
    pub start_ms: i64,
    /// Inclusive end, milliseconds since epoch
    pub end_ms: i64,
    /// Maximum number of points to return
    pub count_back: u32,
}

/// Trait for venues that serve per-market funding history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Markets to collect history for, with the venue's current rate where known.
    async fn markets(&self) -> Result<Vec<MarketRef>>;

    /// Raw funding points for one market within `window`.
    async fn history(&self, market_id: u32, window: HistoryWindow) -> Result<Vec<RawHistoryPoint>>;
}
