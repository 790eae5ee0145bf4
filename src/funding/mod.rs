//! Funding rate pipeline: normalize, join, rank, and history aggregation.
//!
//! Everything here is synchronous and side-effect free. Fetching lives in
//! [`crate::exchange`], scheduling in [`crate::monitor`].

pub mod history;
pub mod join;
pub mod normalize;
pub mod spread;

pub use history::{
    build_history, dedupe_markets, dedupe_rows, partial_failure_message, signed_points,
    Direction, ExcludedSymbols, HistoryPoint, HistoryRow, MarketFailure, MarketRef,
    RawHistoryPoint,
};
pub use join::{all_pairs, join, EnabledExchanges, ExchangePair, JoinPolicy, JoinStatus, TableRow};
pub use normalize::{
    canonical_symbol, normalize, normalize_rate, parse_rate, rate_map, CanonicalSymbol,
    FundingQuote, NormalizeError, Normalizer, RateFilter, RateMap, RawQuote,
};
pub use spread::{top_spreads, SpreadEntry, SpreadLeg};
