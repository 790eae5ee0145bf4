//! Cross-venue join: per-venue rate maps into one row per symbol.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::normalize::{CanonicalSymbol, RateMap};
use crate::exchange::ExchangeId;

/// Venues participating in the join, iterated in priority order.
pub type EnabledExchanges = BTreeSet<ExchangeId>;

/// Unordered venue pair, stored with `first` ahead of `second` in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangePair {
    first: ExchangeId,
    second: ExchangeId,
}

impl ExchangePair {
    /// Pair two distinct venues; `None` when both are the same venue.
    pub fn new(a: ExchangeId, b: ExchangeId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> ExchangeId {
        self.first
    }

    pub fn second(&self) -> ExchangeId {
        self.second
    }

    /// Column label, e.g. `BN-LT`.
    pub fn short_label(&self) -> String {
        format!("{}-{}", self.first.short_code(), self.second.short_code())
    }
}

impl fmt::Display for ExchangePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first.slug(), self.second.slug())
    }
}

impl From<ExchangePair> for String {
    fn from(pair: ExchangePair) -> Self {
        pair.to_string()
    }
}

impl TryFrom<String> for ExchangePair {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (a, b) = value
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("invalid exchange pair `{}`", value))?;
        ExchangePair::new(a.parse()?, b.parse()?)
            .ok_or_else(|| anyhow::anyhow!("exchange pair `{}` names one venue twice", value))
    }
}

/// Every pair of enabled venues, in priority order.
pub fn all_pairs(enabled: &EnabledExchanges) -> Vec<ExchangePair> {
    let venues: Vec<ExchangeId> = enabled.iter().copied().collect();
    let mut pairs = Vec::with_capacity(venues.len() * venues.len().saturating_sub(1) / 2);
    for (i, first) in venues.iter().enumerate() {
        for second in &venues[i + 1..] {
            if let Some(pair) = ExchangePair::new(*first, *second) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// One joined symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub symbol: CanonicalSymbol,
    /// 8h rate per venue that reported one
    pub rates: BTreeMap<ExchangeId, Decimal>,
    /// `rate(first) - rate(second)` for every pair with both rates present
    pub arbs: BTreeMap<ExchangePair, Decimal>,
}

impl TableRow {
    pub fn rate(&self, exchange: ExchangeId) -> Option<Decimal> {
        self.rates.get(&exchange).copied()
    }

    pub fn arb(&self, pair: ExchangePair) -> Option<Decimal> {
        self.arbs.get(&pair).copied()
    }

    /// Present rates of `enabled` venues, in priority order.
    pub fn available<'a>(
        &'a self,
        enabled: &'a EnabledExchanges,
    ) -> impl Iterator<Item = (ExchangeId, Decimal)> + 'a {
        enabled
            .iter()
            .filter_map(move |ex| self.rate(*ex).map(|rate| (*ex, rate)))
    }
}

/// Row inclusion threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPolicy {
    /// Minimum number of venues that must report a symbol
    pub min_sources: usize,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self { min_sources: 2 }
    }
}

/// Join per-venue rate maps into rows.
///
/// Only `enabled` venues contribute. A symbol reported by fewer than
/// `policy.min_sources` venues produces no row. Arbitrage values exist only
/// for pairs where both rates are present.
pub fn join(
    maps: &HashMap<ExchangeId, RateMap>,
    enabled: &EnabledExchanges,
    policy: JoinPolicy,
) -> Vec<TableRow> {
    let mut by_symbol: BTreeMap<&CanonicalSymbol, BTreeMap<ExchangeId, Decimal>> = BTreeMap::new();
    for exchange in enabled {
        let Some(map) = maps.get(exchange) else {
            continue;
        };
        for (symbol, rate) in map {
            by_symbol.entry(symbol).or_default().insert(*exchange, *rate);
        }
    }

    let pairs = all_pairs(enabled);
    by_symbol
        .into_iter()
        .filter(|(_, rates)| rates.len() >= policy.min_sources.max(1))
        .map(|(symbol, rates)| {
            let arbs = pairs
                .iter()
                .filter_map(|pair| {
                    let first = rates.get(&pair.first())?;
                    let second = rates.get(&pair.second())?;
                    // An arb that overflows is left out; both rates still show
                    Some((*pair, first.checked_sub(*second)?))
                })
                .collect();
            TableRow {
                symbol: symbol.clone(),
                rates,
                arbs,
            }
        })
        .collect()
}

/// Overall readiness of the funding board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStatus {
    /// No enabled venue has reported yet
    #[default]
    Idle,
    /// Fewer than the minimum number of venues have reported; names the first
    /// enabled venue still missing
    Waiting(ExchangeId),
    /// Rows available
    Ready,
    /// Enough venues reported but no symbol overlaps
    Empty,
}

impl JoinStatus {
    /// Derive the status from which venues have data and the join outcome.
    pub fn from_sources(
        enabled: &EnabledExchanges,
        with_data: &BTreeSet<ExchangeId>,
        policy: JoinPolicy,
        row_count: usize,
    ) -> Self {
        let reporting = enabled.intersection(with_data).count();
        if reporting == 0 {
            return JoinStatus::Idle;
        }
        if reporting < policy.min_sources {
            return enabled
                .iter()
                .find(|ex| !with_data.contains(ex))
                .map_or(JoinStatus::Idle, |missing| JoinStatus::Waiting(*missing));
        }
        if row_count == 0 {
            JoinStatus::Empty
        } else {
            JoinStatus::Ready
        }
    }

    /// Status line text, `None` when nothing needs saying.
    pub fn message(&self) -> Option<String> {
        match self {
            JoinStatus::Idle => Some("Loading funding data...".to_string()),
            JoinStatus::Waiting(ex) => Some(format!("Waiting for {} data...", ex)),
            JoinStatus::Ready => None,
            JoinStatus::Empty => Some("No overlapping contracts across enabled exchanges".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn map(entries: &[(&str, Decimal)]) -> RateMap {
        entries
            .iter()
            .map(|(s, r)| (CanonicalSymbol::parse(s), *r))
            .collect()
    }

    fn enabled(venues: &[ExchangeId]) -> EnabledExchanges {
        venues.iter().copied().collect()
    }

    fn sym(s: &str) -> CanonicalSymbol {
        CanonicalSymbol::parse(s)
    }

    #[test]
    fn test_pair_ordering_follows_priority() {
        let pair = ExchangePair::new(ExchangeId::Edgex, ExchangeId::Lighter).unwrap();
        assert_eq!(pair.first(), ExchangeId::Lighter);
        assert_eq!(pair.second(), ExchangeId::Edgex);
        assert_eq!(pair.to_string(), "lighter-edgex");
        assert_eq!(pair.short_label(), "LT-EX");
        assert!(ExchangePair::new(ExchangeId::Grvt, ExchangeId::Grvt).is_none());
    }

    #[test]
    fn test_pair_string_round_trip() {
        let pair: ExchangePair = String::from("grvt-aster").try_into().unwrap();
        assert_eq!(pair, ExchangePair::new(ExchangeId::Grvt, ExchangeId::Aster).unwrap());
        assert!(ExchangePair::try_from(String::from("binance")).is_err());
        assert!(ExchangePair::try_from(String::from("binance-binance")).is_err());
    }

    #[test]
    fn test_all_pairs() {
        let pairs = all_pairs(&enabled(&[ExchangeId::Aster, ExchangeId::Binance, ExchangeId::Lighter]));
        let names: Vec<String> = pairs.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["binance-lighter", "binance-aster", "lighter-aster"]);
        assert!(all_pairs(&enabled(&[ExchangeId::Binance])).is_empty());
        assert_eq!(all_pairs(&ExchangeId::ALL.into_iter().collect()).len(), 15);
    }

    #[test]
    fn test_join_inclusion_and_arbs() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Hyperliquid]);
        let mut maps = HashMap::new();
        maps.insert(
            ExchangeId::Binance,
            map(&[("BTC", dec!(0.0001)), ("ETH", dec!(0.0002)), ("DOGE", dec!(0.0005))]),
        );
        maps.insert(ExchangeId::Lighter, map(&[("BTC", dec!(-0.0003)), ("ETH", dec!(0.0001))]));
        maps.insert(ExchangeId::Hyperliquid, map(&[("BTC", dec!(0.0004)), ("SOL", dec!(0.0002))]));

        let rows = join(&maps, &venues, JoinPolicy::default());
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        // DOGE and SOL have a single source each
        assert_eq!(symbols, vec!["BTC", "ETH"]);

        let btc = &rows[0];
        let bn_lt = ExchangePair::new(ExchangeId::Binance, ExchangeId::Lighter).unwrap();
        let bn_hl = ExchangePair::new(ExchangeId::Binance, ExchangeId::Hyperliquid).unwrap();
        let lt_hl = ExchangePair::new(ExchangeId::Lighter, ExchangeId::Hyperliquid).unwrap();
        assert_eq!(btc.arb(bn_lt), Some(dec!(0.0004)));
        assert_eq!(btc.arb(bn_hl), Some(dec!(-0.0003)));
        assert_eq!(btc.arb(lt_hl), Some(dec!(-0.0007)));

        let eth = &rows[1];
        assert_eq!(eth.rate(ExchangeId::Hyperliquid), None);
        assert_eq!(eth.arb(bn_lt), Some(dec!(0.0001)));
        assert_eq!(eth.arb(bn_hl), None);
        assert_eq!(eth.arb(lt_hl), None);
    }

    #[test]
    fn test_arb_present_iff_both_rates_present() {
        let venues: EnabledExchanges = ExchangeId::ALL.into_iter().collect();
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, map(&[("BTC", dec!(0.0001)), ("ETH", dec!(0.00015))]));
        maps.insert(ExchangeId::Edgex, map(&[("BTC", dec!(0.0003))]));
        maps.insert(ExchangeId::Grvt, map(&[("ETH", dec!(-0.0001)), ("BTC", dec!(0))]));
        maps.insert(ExchangeId::Aster, map(&[("ETH", dec!(0.0002))]));

        for row in join(&maps, &venues, JoinPolicy::default()) {
            for pair in all_pairs(&venues) {
                match (row.rate(pair.first()), row.rate(pair.second())) {
                    (Some(x), Some(y)) => assert_eq!(row.arb(pair), Some(x - y)),
                    _ => assert_eq!(row.arb(pair), None),
                }
            }
        }
    }

    #[test]
    fn test_overflowing_arb_is_skipped() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter]);
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, map(&[("BTC", Decimal::MAX)]));
        maps.insert(ExchangeId::Lighter, map(&[("BTC", Decimal::MIN)]));

        let rows = join(&maps, &venues, JoinPolicy::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rate(ExchangeId::Binance), Some(Decimal::MAX));
        assert!(rows[0].arbs.is_empty());
    }

    #[test]
    fn test_join_ignores_disabled_exchanges() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter]);
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, map(&[("BTC", dec!(0.0001))]));
        maps.insert(ExchangeId::Aster, map(&[("BTC", dec!(0.0002))]));

        assert!(join(&maps, &venues, JoinPolicy::default()).is_empty());
    }

    #[test]
    fn test_join_min_sources_threshold() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Edgex]);
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, map(&[("BTC", dec!(0.1)), ("ETH", dec!(0.1))]));
        maps.insert(ExchangeId::Lighter, map(&[("BTC", dec!(0.1)), ("ETH", dec!(0.1))]));
        maps.insert(ExchangeId::Edgex, map(&[("BTC", dec!(0.1))]));

        let rows = join(&maps, &venues, JoinPolicy { min_sources: 3 });
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, sym("BTC"));
    }

    #[test]
    fn test_join_status() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Edgex]);
        let policy = JoinPolicy::default();

        assert_eq!(
            JoinStatus::from_sources(&venues, &BTreeSet::new(), policy, 0),
            JoinStatus::Idle
        );
        assert_eq!(
            JoinStatus::from_sources(&venues, &[ExchangeId::Lighter].into(), policy, 0),
            JoinStatus::Waiting(ExchangeId::Binance)
        );
        assert_eq!(
            JoinStatus::from_sources(&venues, &[ExchangeId::Binance].into(), policy, 0),
            JoinStatus::Waiting(ExchangeId::Lighter)
        );
        assert_eq!(
            JoinStatus::from_sources(&venues, &[ExchangeId::Binance, ExchangeId::Edgex].into(), policy, 0),
            JoinStatus::Empty
        );
        assert_eq!(
            JoinStatus::from_sources(&venues, &[ExchangeId::Binance, ExchangeId::Edgex].into(), policy, 3),
            JoinStatus::Ready
        );
        assert_eq!(
            JoinStatus::Waiting(ExchangeId::Edgex).message().as_deref(),
            Some("Waiting for edgeX data...")
        );
        assert_eq!(JoinStatus::Ready.message(), None);
    }

    #[test]
    fn test_table_row_serde_uses_pair_names() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter]);
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, map(&[("BTC", dec!(0.0001))]));
        maps.insert(ExchangeId::Lighter, map(&[("BTC", dec!(0.0003))]));
        let rows = join(&maps, &venues, JoinPolicy::default());

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["symbol"], "BTC");
        assert!(json["arbs"].get("binance-lighter").is_some());
        assert!(json["rates"].get("binance").is_some());

        let back: TableRow = serde_json::from_value(json).unwrap();
        assert_eq!(back, rows[0]);
    }
}
