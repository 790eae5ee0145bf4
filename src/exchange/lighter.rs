//! Lighter REST client: current funding rates and per-market funding history.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::http::{base_url, build_client, decode};
use super::traits::{ExchangeId, FundingSource, HistorySource, HistoryWindow};
use crate::funding::{FundingQuote, MarketRef, Normalizer, RawHistoryPoint, RawQuote};
use crate::utils::decimal::RawNumber;

const MAINNET_API_URL: &str = "https://mainnet.zklighter.elliot.ai";

/// History is requested at hourly resolution.
const HISTORY_RESOLUTION: &str = "1h";

/// `GET /api/v1/funding-rates`. The feed mixes Lighter's own markets with
/// reference rates from other venues.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingRatesResponse {
    #[serde(default)]
    pub funding_rates: Vec<FundingRateEntry>,
}

/// Fields are optional so one malformed entry drops alone.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingRateEntry {
    #[serde(default)]
    pub market_id: Option<u32>,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub rate: Option<RawNumber>,
}

impl FundingRateEntry {
    fn is_lighter(&self) -> bool {
        self.exchange.eq_ignore_ascii_case("lighter")
    }
}

/// `GET /api/v1/fundings`.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingsResponse {
    #[serde(default)]
    pub fundings: Vec<RawHistoryPoint>,
}

/// Lighter API client.
#[derive(Debug, Clone)]
pub struct LighterClient {
    http: Client,
    base_url: String,
}

impl LighterClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(MAINNET_API_URL)
    }

    pub fn with_base_url(url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url(url),
        })
    }

    /// Current funding rates of Lighter's own markets.
    #[instrument(skip(self), name = "lighter_funding_rates")]
    pub async fn get_funding_rates(&self) -> Result<Vec<FundingRateEntry>> {
        let url = format!("{}/api/v1/funding-rates", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch funding rates")?;

        let payload: FundingRatesResponse = decode(response, "Lighter", "funding-rates").await?;
        let total = payload.funding_rates.len();
        let entries: Vec<FundingRateEntry> = payload
            .funding_rates
            .into_iter()
            .filter(FundingRateEntry::is_lighter)
            .collect();

        debug!(total, lighter = entries.len(), "Fetched Lighter funding feed");
        Ok(entries)
    }

    /// Funding points for one market.
    #[instrument(skip(self), name = "lighter_fundings")]
    pub async fn get_fundings(
        &self,
        market_id: u32,
        window: HistoryWindow,
    ) -> Result<Vec<RawHistoryPoint>> {
        let url = format!("{}/api/v1/fundings", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("market_id", market_id.to_string()),
                ("resolution", HISTORY_RESOLUTION.to_string()),
                ("start_timestamp", window.start_ms.to_string()),
                ("end_timestamp", window.end_ms.to_string()),
                ("count_back", window.count_back.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch fundings for market {}", market_id))?;

        let payload: FundingsResponse = decode(response, "Lighter", "fundings").await?;
        debug!(market_id, points = payload.fundings.len(), "Fetched funding history");
        Ok(payload.fundings)
    }
}

#[async_trait]
impl FundingSource for LighterClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Lighter
    }

    #[instrument(skip(self), name = "lighter_fetch_quotes")]
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>> {
        let entries = self.get_funding_rates().await?;
        let raw = entries.iter().filter_map(|e| {
            Some(RawQuote {
                symbol: &e.symbol,
                rate: e.rate.as_ref()?,
                interval_hours: None,
                next_funding_time: None,
            })
        });
        let quotes = Normalizer::new(ExchangeId::Lighter, Utc::now()).quotes(raw);
        info!("Fetched {} Lighter funding rates", quotes.len());
        Ok(quotes)
    }
}

#[async_trait]
impl HistorySource for LighterClient {
    async fn markets(&self) -> Result<Vec<MarketRef>> {
        let entries = self.get_funding_rates().await?;
        Ok(entries
            .into_iter()
            .filter_map(|e| {
                Some(MarketRef {
                    market_id: e.market_id?,
                    current_rate: e.rate.as_ref().and_then(RawNumber::to_decimal),
                    symbol: e.symbol,
                })
            })
            .collect())
    }

    async fn history(&self, market_id: u32, window: HistoryWindow) -> Result<Vec<RawHistoryPoint>> {
        self.get_fundings(market_id, window).await
    }
}
