//! Funding history aggregation for a single venue.
//!
//! Each market's hourly points over the lookback window become a signed
//! series plus summary statistics. The series sum stands in for the
//! cumulative rate over the window, and projected profit treats it as a
//! percentage of the principal.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::utils::decimal::{mean, sum, RawNumber};

/// Side that paid funding for a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    /// Anything other than `short` (case-insensitive) counts as long.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("short") {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map(Direction::parse).unwrap_or_default())
    }
}

/// One point as the venue reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawHistoryPoint {
    pub timestamp: i64,
    #[serde(default)]
    pub rate: Option<RawNumber>,
    #[serde(default)]
    pub value: Option<RawNumber>,
    #[serde(default)]
    pub direction: Direction,
}

impl RawHistoryPoint {
    /// Magnitude from `rate`, falling back to `value`, with the sign taken
    /// from `direction`.
    pub fn signed_rate(&self) -> Option<Decimal> {
        let magnitude = self
            .rate
            .as_ref()
            .and_then(RawNumber::to_decimal)
            .or_else(|| self.value.as_ref().and_then(RawNumber::to_decimal))?;
        Some(match self.direction {
            Direction::Short => -magnitude,
            Direction::Long => magnitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub rate: Decimal,
}

/// Chronological signed points; unparseable points are dropped.
pub fn signed_points(raw: &[RawHistoryPoint]) -> Vec<HistoryPoint> {
    let mut sorted: Vec<&RawHistoryPoint> = raw.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);
    sorted
        .into_iter()
        .filter_map(|p| {
            p.signed_rate().map(|rate| HistoryPoint {
                timestamp: p.timestamp,
                rate,
            })
        })
        .collect()
}

/// A market to collect history for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRef {
    pub market_id: u32,
    pub symbol: String,
    /// Rate the venue currently reports, used when no history is available
    pub current_rate: Option<Decimal>,
}

/// Aggregated history for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub market_id: u32,
    pub symbol: String,
    pub current_rate: Option<Decimal>,
    pub average_rate: Option<Decimal>,
    pub series: Vec<Decimal>,
    #[serde(default)]
    pub seven_day_rate: Option<Decimal>,
    #[serde(default)]
    pub seven_day_profit: Option<Decimal>,
}

impl HistoryRow {
    /// Recompute the series-derived fields for `principal`.
    ///
    /// A stored average is kept; everything else follows from the series.
    pub fn rederive(mut self, principal: Decimal) -> Self {
        if self.average_rate.is_none() {
            self.average_rate = mean(&self.series);
        }
        if let Some(latest) = self.series.last() {
            self.current_rate = Some(*latest);
        }
        self.seven_day_rate = sum(&self.series);
        self.seven_day_profit = projected_profit(self.seven_day_rate, principal);
        self
    }

    fn dedupe_key(&self) -> (u32, String) {
        (self.market_id, self.symbol.to_uppercase())
    }
}

/// `principal * cumulative / 100`, when both are meaningful.
pub fn projected_profit(cumulative_rate: Option<Decimal>, principal: Decimal) -> Option<Decimal> {
    if principal <= Decimal::ZERO {
        return None;
    }
    cumulative_rate
        .and_then(|rate| principal.checked_mul(rate))
        .map(|amount| amount / Decimal::ONE_HUNDRED)
}

/// Aggregate one market's raw points.
pub fn build_history(market: &MarketRef, raw: &[RawHistoryPoint], principal: Decimal) -> HistoryRow {
    let series: Vec<Decimal> = signed_points(raw).into_iter().map(|p| p.rate).collect();
    HistoryRow {
        market_id: market.market_id,
        symbol: market.symbol.clone(),
        current_rate: market.current_rate,
        average_rate: mean(&series),
        series,
        seven_day_rate: None,
        seven_day_profit: None,
    }
    .rederive(principal)
}

/// Drop repeated `(market_id, upper(symbol))` markets, keeping the first.
pub fn dedupe_markets(markets: Vec<MarketRef>) -> Vec<MarketRef> {
    let mut seen = HashSet::new();
    markets
        .into_iter()
        .filter(|m| seen.insert((m.market_id, m.symbol.to_uppercase())))
        .collect()
}

/// Drop repeated `(market_id, upper(symbol))` rows, keeping the first.
pub fn dedupe_rows(rows: Vec<HistoryRow>) -> Vec<HistoryRow> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.dedupe_key())).collect()
}

/// Symbols hidden from the history view regardless of data quality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedSymbols(BTreeSet<String>);

impl ExcludedSymbols {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains(&symbol.to_uppercase())
    }

    pub fn retain(&self, rows: Vec<HistoryRow>) -> Vec<HistoryRow> {
        rows.into_iter().filter(|r| !self.contains(&r.symbol)).collect()
    }
}

/// One market whose history could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFailure {
    pub symbol: String,
    pub reason: String,
}

/// `Partial data: SYM: reason; ...`, or `None` when nothing failed.
pub fn partial_failure_message(failures: &[MarketFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let detail: Vec<String> = failures
        .iter()
        .map(|f| format!("{}: {}", f.symbol, f.reason))
        .collect();
    Some(format!("Partial data: {}", detail.join("; ")))
}
