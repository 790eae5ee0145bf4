//! Binance-compatible futures REST client.
//!
//! Serves both Binance and Aster, which expose the same public `/fapi`
//! funding endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::http::{base_url, build_client, decode};
use super::traits::{ExchangeId, FundingSource};
use super::types::{FundingInfoEntry, PremiumIndexEntry};
use crate::funding::{FundingQuote, Normalizer, RawQuote};

const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";
const ASTER_FUTURES_URL: &str = "https://fapi.asterdex.com";

/// Public futures market data client for one `/fapi` venue.
#[derive(Debug, Clone)]
pub struct FapiClient {
    http: Client,
    exchange: ExchangeId,
    base_url: String,
}

impl FapiClient {
    /// Client for Binance USD-M futures.
    pub fn binance() -> Result<Self> {
        Self::with_base_url(ExchangeId::Binance, BINANCE_FUTURES_URL)
    }

    /// Client for Aster perpetuals.
    pub fn aster() -> Result<Self> {
        Self::with_base_url(ExchangeId::Aster, ASTER_FUTURES_URL)
    }

    pub fn with_base_url(exchange: ExchangeId, url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            exchange,
            base_url: base_url(url),
        })
    }

    /// Get latest funding rates for all perpetual contracts.
    #[instrument(skip(self), fields(exchange = %self.exchange))]
    pub async fn get_premium_index(&self) -> Result<Vec<PremiumIndexEntry>> {
        let url = format!("{}/fapi/v1/premiumIndex", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch premium index")?;

        decode(response, self.exchange.slug(), "premiumIndex").await
    }

    /// Get funding intervals for symbols that deviate from 8h.
    #[instrument(skip(self), fields(exchange = %self.exchange))]
    pub async fn get_funding_info(&self) -> Result<Vec<FundingInfoEntry>> {
        let url = format!("{}/fapi/v1/fundingInfo", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch funding info")?;

        decode(response, self.exchange.slug(), "fundingInfo").await
    }
}

/// Join premium index rates with their funding intervals and normalize.
///
/// Intervals are keyed by upper-cased raw symbol; symbols missing from the
/// funding info use the 8h default.
pub fn normalize_entries(
    exchange: ExchangeId,
    premium: &[PremiumIndexEntry],
    info: &[FundingInfoEntry],
    as_of: DateTime<Utc>,
) -> Vec<FundingQuote> {
    let intervals: HashMap<String, u32> = info
        .iter()
        .filter_map(|e| e.funding_interval_hours.map(|h| (e.symbol.to_uppercase(), h)))
        .collect();

    let raw = premium.iter().filter_map(|entry| {
        let rate = entry.last_funding_rate.as_ref()?;
        Some(RawQuote {
            symbol: &entry.symbol,
            rate,
            interval_hours: intervals
                .get(&entry.symbol.to_uppercase())
                .map(|h| Decimal::from(*h)),
            next_funding_time: entry.next_funding_time,
        })
    });

    Normalizer::new(exchange, as_of).quotes(raw)
}

#[async_trait]
impl FundingSource for FapiClient {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    #[instrument(skip(self), name = "fapi_fetch_quotes", fields(exchange = %self.exchange))]
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>> {
        let (premium, info) = tokio::try_join!(self.get_premium_index(), self.get_funding_info())?;
        let quotes = normalize_entries(self.exchange, &premium, &info, Utc::now());

        info!(
            exchange = %self.exchange,
            entries = premium.len(),
            quotes = quotes.len(),
            "Fetched funding rates"
        );
        debug!(intervals = info.len(), "Applied funding interval overrides");
        Ok(quotes)
    }
}
