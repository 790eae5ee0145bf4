//! Rate normalization to a common 8-hour basis and symbol canonicalization.
//!
//! Venues disagree on two things that matter for a cross-venue comparison:
//! - funding interval (Binance mostly 8h with some 4h/1h symbols, edgeX 4h,
//!   Hyperliquid 1h), fixed here by scaling every rate to its 8h equivalent
//! - symbol spelling (`BTCUSDT`, `BTC`, `kPEPE`), fixed by reducing every
//!   symbol to its base asset

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

use crate::exchange::ExchangeId;
use crate::utils::decimal::RawNumber;

/// The common funding basis, in hours.
pub const BASE_INTERVAL_HOURS: Decimal = Decimal::from_parts(8, 0, 0, false, 0);

/// Binance reports this literal for contracts without a live funding rate.
pub const ZERO_RATE_SENTINEL: &str = "0.00000000";

const QUOTE_SUFFIXES: [&str; 2] = ["USDT", "USD"];

/// Why a raw funding entry was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("rate `{0}` is not a finite number")]
    UnparseableRate(String),
    #[error("no scheduled funding (next funding time {0})")]
    NoScheduledFunding(i64),
    #[error("rate reported as the all-zero sentinel")]
    ZeroSentinel,
    #[error("funding interval must be positive, got {0}h")]
    InvalidInterval(Decimal),
    #[error("rate {0} overflows on the 8h basis")]
    OutOfRange(Decimal),
}

/// Base-asset symbol shared by every venue (`BTC`, `1000PEPE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSymbol(String);

impl CanonicalSymbol {
    /// Strip trailing quote currencies and upper-case.
    ///
    /// Stripping repeats while a suffix remains and something is left over,
    /// so the result is a fixed point: `parse(parse(s)) == parse(s)`.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        let mut base = upper.as_str();
        while let Some(rest) = QUOTE_SUFFIXES
            .iter()
            .find_map(|suffix| base.strip_suffix(suffix))
            .filter(|rest| !rest.is_empty())
        {
            base = rest;
        }
        Self(base.to_string())
    }

    /// Canonicalize a symbol from a venue that writes thousand-unit contracts
    /// as `kASSET` (Hyperliquid `kPEPE` is `1000PEPE` everywhere else).
    ///
    /// Only a lower-case `k` followed by an upper-case letter is a prefix, so
    /// `KAITO` stays `KAITO`.
    pub fn from_prefixed(raw: &str) -> Self {
        let raw = raw.trim();
        match raw
            .strip_prefix('k')
            .filter(|asset| asset.starts_with(|c: char| c.is_ascii_uppercase()))
        {
            Some(asset) => Self::parse(&format!("1000{}", asset)),
            None => Self::parse(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalSymbol {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Canonicalize `raw` the way `exchange` spells its symbols.
pub fn canonical_symbol(exchange: ExchangeId, raw: &str) -> CanonicalSymbol {
    match exchange {
        ExchangeId::Hyperliquid => CanonicalSymbol::from_prefixed(raw),
        _ => CanonicalSymbol::parse(raw),
    }
}

/// Parse a raw rate, rejecting anything that is not a finite number.
pub fn parse_rate(raw: &RawNumber) -> Result<Decimal, NormalizeError> {
    raw.to_decimal()
        .ok_or_else(|| NormalizeError::UnparseableRate(raw.to_string()))
}

/// Scale a rate paid every `interval_hours` to its 8h equivalent.
///
/// A missing interval means the venue already funds on the 8h basis.
pub fn normalize_rate(
    rate: Decimal,
    interval_hours: Option<Decimal>,
) -> Result<Decimal, NormalizeError> {
    let hours = interval_hours.unwrap_or(BASE_INTERVAL_HOURS);
    if hours <= Decimal::ZERO {
        return Err(NormalizeError::InvalidInterval(hours));
    }
    if hours == BASE_INTERVAL_HOURS {
        return Ok(rate);
    }
    rate.checked_mul(BASE_INTERVAL_HOURS)
        .and_then(|scaled| scaled.checked_div(hours))
        .ok_or(NormalizeError::OutOfRange(rate))
}

/// Normalize one raw entry into its canonical symbol and 8h rate.
pub fn normalize(
    exchange: ExchangeId,
    raw_symbol: &str,
    raw_rate: &RawNumber,
    interval_hours: Option<Decimal>,
) -> Result<(CanonicalSymbol, Decimal), NormalizeError> {
    let rate = normalize_rate(parse_rate(raw_rate)?, interval_hours)?;
    Ok((canonical_symbol(exchange, raw_symbol), rate))
}

/// Venue-specific drop rules applied before normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateFilter {
    /// Drop entries whose next funding time is not in the future (`<= 0`).
    pub require_scheduled_funding: bool,
    /// Drop entries whose raw rate string is [`ZERO_RATE_SENTINEL`].
    pub zero_sentinel: bool,
}

impl RateFilter {
    /// Drop rules for `exchange`. Only Binance marks "no data" with a zero
    /// sentinel; a zero from any other venue is a genuine rate.
    pub fn for_exchange(exchange: ExchangeId) -> Self {
        match exchange {
            ExchangeId::Binance => Self {
                require_scheduled_funding: true,
                zero_sentinel: true,
            },
            _ => Self::default(),
        }
    }

    pub fn check(
        &self,
        raw_rate: &RawNumber,
        next_funding_time: Option<i64>,
    ) -> Result<(), NormalizeError> {
        if self.require_scheduled_funding {
            let next = next_funding_time.unwrap_or(0);
            if next <= 0 {
                return Err(NormalizeError::NoScheduledFunding(next));
            }
        }
        if self.zero_sentinel && raw_rate.as_text() == Some(ZERO_RATE_SENTINEL) {
            return Err(NormalizeError::ZeroSentinel);
        }
        Ok(())
    }
}

/// A funding rate from one venue for one symbol, on the 8h basis.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingQuote {
    pub exchange: ExchangeId,
    pub symbol: CanonicalSymbol,
    /// Fractional rate (0.0001 = 0.01%) per 8h
    pub rate: Decimal,
    pub as_of: DateTime<Utc>,
}

/// One venue entry before validation.
#[derive(Debug, Clone)]
pub struct RawQuote<'a> {
    pub symbol: &'a str,
    pub rate: &'a RawNumber,
    /// Native funding interval; `None` means 8h
    pub interval_hours: Option<Decimal>,
    /// Next settlement, ms since epoch, where the venue reports it
    pub next_funding_time: Option<i64>,
}

/// Turns raw venue entries into [`FundingQuote`]s for one venue.
#[derive(Debug, Clone)]
pub struct Normalizer {
    exchange: ExchangeId,
    filter: RateFilter,
    as_of: DateTime<Utc>,
}

impl Normalizer {
    /// Normalizer with the venue's default drop rules, stamped `as_of`.
    pub fn new(exchange: ExchangeId, as_of: DateTime<Utc>) -> Self {
        Self {
            exchange,
            filter: RateFilter::for_exchange(exchange),
            as_of,
        }
    }

    pub fn with_filter(mut self, filter: RateFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Validate and normalize one entry.
    pub fn quote(&self, raw: &RawQuote<'_>) -> Result<FundingQuote, NormalizeError> {
        self.filter.check(raw.rate, raw.next_funding_time)?;
        let (symbol, rate) = normalize(self.exchange, raw.symbol, raw.rate, raw.interval_hours)?;
        Ok(FundingQuote {
            exchange: self.exchange,
            symbol,
            rate,
            as_of: self.as_of,
        })
    }

    /// Normalize a batch, silently dropping entries that fail validation.
    pub fn quotes<'a, I>(&self, raw: I) -> Vec<FundingQuote>
    where
        I: IntoIterator<Item = RawQuote<'a>>,
    {
        let mut dropped = 0usize;
        let quotes: Vec<FundingQuote> = raw
            .into_iter()
            .filter_map(|entry| match self.quote(&entry) {
                Ok(quote) => Some(quote),
                Err(reason) => {
                    trace!(exchange = %self.exchange, symbol = entry.symbol, %reason, "Dropping funding entry");
                    dropped += 1;
                    None
                }
            })
            .collect();

        debug!(
            exchange = %self.exchange,
            kept = quotes.len(),
            dropped,
            "Normalized funding entries"
        );
        quotes
    }
}

/// Per-venue map of canonical symbol to 8h rate.
pub type RateMap = HashMap<CanonicalSymbol, Decimal>;

/// Collapse quotes into a rate map; a later duplicate symbol wins.
pub fn rate_map(quotes: &[FundingQuote]) -> RateMap {
    quotes
        .iter()
        .map(|q| (q.symbol.clone(), q.rate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(s: &str) -> RawNumber {
        RawNumber::from(s)
    }

    #[test]
    fn test_canonical_symbol_strips_quote() {
        assert_eq!(CanonicalSymbol::parse("BTCUSDT").as_str(), "BTC");
        assert_eq!(CanonicalSymbol::parse("ethusd").as_str(), "ETH");
        assert_eq!(CanonicalSymbol::parse("sol").as_str(), "SOL");
        assert_eq!(CanonicalSymbol::parse("1000PEPEUSDT").as_str(), "1000PEPE");
        // Nothing left after stripping: keep the quote itself.
        assert_eq!(CanonicalSymbol::parse("USDT").as_str(), "USDT");
    }

    #[test]
    fn test_canonical_symbol_is_idempotent() {
        for s in ["BTCUSDT", "USDUSDT", "BUSDUSDT", "kSHIB", "1000BONK", "usd", "", "ETH-USD"] {
            let once = CanonicalSymbol::parse(s);
            let twice = CanonicalSymbol::parse(once.as_str());
            assert_eq!(once, twice, "not idempotent for {s}");

            let once = CanonicalSymbol::from_prefixed(s);
            let twice = CanonicalSymbol::from_prefixed(once.as_str());
            assert_eq!(once, twice, "prefixed form not idempotent for {s}");
        }
    }

    #[test]
    fn test_thousand_prefix_mapping() {
        assert_eq!(CanonicalSymbol::from_prefixed("kSHIB").as_str(), "1000SHIB");
        assert_eq!(CanonicalSymbol::from_prefixed("kPEPE").as_str(), "1000PEPE");
        assert_eq!(CanonicalSymbol::from_prefixed("KAITO").as_str(), "KAITO");
        assert_eq!(CanonicalSymbol::from_prefixed("BTC").as_str(), "BTC");
        assert_eq!(canonical_symbol(ExchangeId::Hyperliquid, "kBONK").as_str(), "1000BONK");
        // Only the prefix-mapped venue rewrites.
        assert_eq!(canonical_symbol(ExchangeId::Lighter, "kBONK").as_str(), "KBONK");
    }

    #[test]
    fn test_normalize_rate_scales_to_8h() {
        assert_eq!(normalize_rate(dec!(0.0001), None).unwrap(), dec!(0.0001));
        assert_eq!(normalize_rate(dec!(0.0001), Some(dec!(8))).unwrap(), dec!(0.0001));
        assert_eq!(normalize_rate(dec!(0.0001), Some(dec!(4))).unwrap(), dec!(0.0002));
        assert_eq!(normalize_rate(dec!(0.00001), Some(dec!(1))).unwrap(), dec!(0.00008));
        assert_eq!(normalize_rate(dec!(-0.0003), Some(dec!(2))).unwrap(), dec!(-0.0012));
        for (rate, hours) in [(dec!(0.0012), dec!(4)), (dec!(-0.0005), dec!(1)), (dec!(0.01), dec!(16))] {
            assert_eq!(normalize_rate(rate, Some(hours)).unwrap(), rate * dec!(8) / hours);
        }
    }

    #[test]
    fn test_normalize_rate_rejects_bad_interval() {
        assert_eq!(
            normalize_rate(dec!(0.0001), Some(Decimal::ZERO)),
            Err(NormalizeError::InvalidInterval(Decimal::ZERO))
        );
        assert!(normalize_rate(dec!(0.0001), Some(dec!(-1))).is_err());
    }

    #[test]
    fn test_normalize_rate_rejects_overflow() {
        let huge = Decimal::MAX / dec!(2);
        assert_eq!(normalize_rate(huge, Some(dec!(1))), Err(NormalizeError::OutOfRange(huge)));
        // Already on the 8h basis: nothing to scale
        assert_eq!(normalize_rate(huge, None), Ok(huge));
        assert!(normalize_rate(huge, Some(dec!(16))).is_err());

        let normalizer = Normalizer::new(ExchangeId::Hyperliquid, Utc::now());
        let good = raw("0.00001");
        let extreme = RawNumber::Text(huge.to_string());
        let quotes = normalizer.quotes(vec![
            RawQuote { symbol: "BTC", rate: &good, interval_hours: Some(dec!(1)), next_funding_time: None },
            RawQuote { symbol: "ETH", rate: &extreme, interval_hours: Some(dec!(1)), next_funding_time: None },
        ]);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol.as_str(), "BTC");
    }

    #[test]
    fn test_normalize_entry() {
        let (symbol, rate) =
            normalize(ExchangeId::Binance, "BTCUSDT", &raw("0.0001"), Some(dec!(4))).unwrap();
        assert_eq!(symbol.as_str(), "BTC");
        assert_eq!(rate, dec!(0.0002));

        assert_eq!(
            normalize(ExchangeId::Binance, "BTCUSDT", &raw("n/a"), None),
            Err(NormalizeError::UnparseableRate("n/a".to_string()))
        );
    }

    #[test]
    fn test_binance_filter_drops_sentinel_and_unscheduled() {
        let filter = RateFilter::for_exchange(ExchangeId::Binance);
        assert_eq!(filter.check(&raw(ZERO_RATE_SENTINEL), Some(1)), Err(NormalizeError::ZeroSentinel));
        assert_eq!(filter.check(&raw("0.0001"), Some(0)), Err(NormalizeError::NoScheduledFunding(0)));
        assert_eq!(filter.check(&raw("0.0001"), None), Err(NormalizeError::NoScheduledFunding(0)));
        assert!(filter.check(&raw("0.0001"), Some(1_700_000_000_000)).is_ok());
        // A zero written differently is a real zero.
        assert!(filter.check(&raw("0"), Some(1)).is_ok());
    }

    #[test]
    fn test_zero_is_genuine_on_other_venues() {
        let normalizer = Normalizer::new(ExchangeId::Aster, Utc::now());
        let zero = raw(ZERO_RATE_SENTINEL);
        let quote = normalizer
            .quote(&RawQuote {
                symbol: "BTCUSDT",
                rate: &zero,
                interval_hours: None,
                next_funding_time: None,
            })
            .unwrap();
        assert_eq!(quote.rate, Decimal::ZERO);
    }

    #[test]
    fn test_normalizer_batch_drops_invalid() {
        let normalizer = Normalizer::new(ExchangeId::Binance, Utc::now());
        let good = raw("0.0001");
        let sentinel = raw(ZERO_RATE_SENTINEL);
        let garbage = raw("");
        let quotes = normalizer.quotes(vec![
            RawQuote { symbol: "BTCUSDT", rate: &good, interval_hours: Some(dec!(4)), next_funding_time: Some(1) },
            RawQuote { symbol: "ETHUSDT", rate: &sentinel, interval_hours: None, next_funding_time: Some(1) },
            RawQuote { symbol: "SOLUSDT", rate: &garbage, interval_hours: None, next_funding_time: Some(1) },
            RawQuote { symbol: "XRPUSDT", rate: &good, interval_hours: None, next_funding_time: Some(0) },
        ]);

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol.as_str(), "BTC");
        assert_eq!(quotes[0].rate, dec!(0.0002));
    }

    #[test]
    fn test_rate_map_last_duplicate_wins() {
        let now = Utc::now();
        let quotes = vec![
            FundingQuote { exchange: ExchangeId::Lighter, symbol: "BTC".into(), rate: dec!(0.1), as_of: now },
            FundingQuote { exchange: ExchangeId::Lighter, symbol: "BTC".into(), rate: dec!(0.2), as_of: now },
        ];
        let map = rate_map(&quotes);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&CanonicalSymbol::parse("BTC")], dec!(0.2));
    }
}
