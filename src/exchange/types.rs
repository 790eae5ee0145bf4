//! Wire types for the Binance-compatible futures API (`/fapi`).
//!
//! Binance and Aster serve the same premium index and funding info shapes.

use serde::Deserialize;

use crate::utils::decimal::RawNumber;

/// One entry of `GET /fapi/v1/premiumIndex`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumIndexEntry {
    pub symbol: String,
    /// Latest funding rate for the current interval
    #[serde(default)]
    pub last_funding_rate: Option<RawNumber>,
    /// Next settlement time in ms; `0` for contracts without scheduled funding
    #[serde(default)]
    pub next_funding_time: Option<i64>,
}

/// One entry of `GET /fapi/v1/fundingInfo`.
///
/// Only symbols with a non-default interval or cap are listed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingInfoEntry {
    pub symbol: String,
    #[serde(default)]
    pub funding_interval_hours: Option<u32>,
}
