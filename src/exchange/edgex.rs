//! edgeX REST client.
//!
//! edgeX has no bulk funding endpoint. The contract list comes from the
//! metadata feed and each contract's latest rate is fetched one at a time,
//! with a fixed gap between requests to stay under the rate limit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::http::{base_url, build_client, decode};
use super::traits::{ExchangeId, FundingSource};
use crate::funding::{FundingQuote, Normalizer, RawQuote};
use crate::utils::decimal::RawNumber;

const MAINNET_API_URL: &str = "https://pro.edgex.exchange";

/// Gap between sequential per-contract requests.
pub const DEFAULT_FETCH_GAP: Duration = Duration::from_millis(500);

/// edgeX settles every 4 hours unless the contract says otherwise.
const DEFAULT_INTERVAL_HOURS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

#[derive(Debug, Clone, Deserialize)]
pub struct MetaResponse {
    pub data: Option<MetaData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(default)]
    pub contract_list: Vec<Contract>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_id: String,
    /// e.g. `BTCUSDT`
    pub contract_name: String,
    #[serde(default)]
    pub enable_trade: bool,
    #[serde(default)]
    pub enable_display: bool,
    #[serde(default)]
    pub enable_open_position: bool,
    #[serde(default)]
    pub funding_rate_interval_min: Option<RawNumber>,
}

impl Contract {
    /// Only contracts that can be traded, are shown, and accept new positions.
    pub fn is_listed(&self) -> bool {
        self.enable_trade && self.enable_display && self.enable_open_position
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingResponse {
    #[serde(default)]
    pub data: Vec<FundingPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingPoint {
    pub contract_id: String,
    #[serde(default)]
    pub funding_rate: Option<RawNumber>,
    #[serde(default)]
    pub forecast_funding_rate: Option<RawNumber>,
    #[serde(default)]
    pub funding_rate_interval_min: Option<RawNumber>,
    #[serde(default)]
    pub funding_time: Option<String>,
}

impl FundingPoint {
    /// The forecast rate if it parses, else the last settled rate.
    pub fn effective_rate(&self) -> Option<&RawNumber> {
        [&self.forecast_funding_rate, &self.funding_rate]
            .into_iter()
            .flatten()
            .find(|raw| raw.to_decimal().is_some())
    }
}

/// Funding interval in hours from a minutes field, if positive.
fn interval_hours(minutes: Option<&RawNumber>) -> Option<Decimal> {
    minutes
        .and_then(RawNumber::to_decimal)
        .filter(|m| *m > Decimal::ZERO)
        .map(|m| m / Decimal::from(60))
}

/// edgeX API client.
#[derive(Debug, Clone)]
pub struct EdgexClient {
    http: Client,
    base_url: String,
    fetch_gap: Duration,
}

impl EdgexClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(MAINNET_API_URL)
    }

    pub fn with_base_url(url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url(url),
            fetch_gap: DEFAULT_FETCH_GAP,
        })
    }

    pub fn with_fetch_gap(mut self, gap: Duration) -> Self {
        self.fetch_gap = gap;
        self
    }

    /// Listed perpetual contracts.
    #[instrument(skip(self), name = "edgex_metadata")]
    pub async fn get_contracts(&self) -> Result<Vec<Contract>> {
        let url = format!("{}/api/v1/public/meta/getMetaData", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch edgeX metadata")?;

        let payload: MetaResponse = decode(response, "edgeX", "metadata").await?;
        let contracts = payload
            .data
            .context("Metadata response missing contractList")?
            .contract_list;
        let total = contracts.len();
        let listed: Vec<Contract> = contracts.into_iter().filter(Contract::is_listed).collect();

        debug!(total, listed = listed.len(), "Fetched edgeX contracts");
        Ok(listed)
    }

    /// Latest funding point for one contract, `None` when the venue has none.
    #[instrument(skip(self), name = "edgex_latest_funding")]
    pub async fn get_latest_funding(&self, contract_id: &str) -> Result<Option<FundingPoint>> {
        let url = format!("{}/api/v1/public/funding/getLatestFundingRate", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("contractId", contract_id)])
            .send()
            .await
            .with_context(|| format!("Failed to fetch funding for {}", contract_id))?;

        let payload: FundingResponse = decode(response, "edgeX", "funding").await?;
        Ok(payload.data.into_iter().next())
    }
}

#[async_trait]
impl FundingSource for EdgexClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Edgex
    }

    /// Fetch every listed contract sequentially.
    ///
    /// Per-contract failures are logged and skipped; the call only fails when
    /// the metadata fetch fails or no contract could be read.
    #[instrument(skip(self), name = "edgex_fetch_quotes")]
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>> {
        let contracts = self.get_contracts().await?;
        let mut points: Vec<(Contract, FundingPoint)> = Vec::with_capacity(contracts.len());
        let mut last_error: Option<anyhow::Error> = None;
        let mut failed = 0usize;

        let count = contracts.len();
        for (index, contract) in contracts.into_iter().enumerate() {
            match self.get_latest_funding(&contract.contract_id).await {
                Ok(Some(point)) => points.push((contract, point)),
                Ok(None) => debug!(contract = %contract.contract_name, "No funding point"),
                Err(e) => {
                    warn!(contract = %contract.contract_name, error = %e, "edgeX funding request failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
            if index + 1 < count {
                tokio::time::sleep(self.fetch_gap).await;
            }
        }

        if let Some(e) = last_error {
            if failed == count {
                return Err(e.context(format!("All {} edgeX funding requests failed", count)));
            }
        }

        let raw = points.iter().filter_map(|(contract, point)| {
            let interval = interval_hours(point.funding_rate_interval_min.as_ref())
                .or_else(|| interval_hours(contract.funding_rate_interval_min.as_ref()))
                .unwrap_or(DEFAULT_INTERVAL_HOURS);
            Some(RawQuote {
                symbol: &contract.contract_name,
                rate: point.effective_rate()?,
                interval_hours: Some(interval),
                next_funding_time: None,
            })
        });
        let quotes = Normalizer::new(ExchangeId::Edgex, Utc::now()).quotes(raw);

        info!(contracts = count, failed, quotes = quotes.len(), "Fetched edgeX funding rates");
        Ok(quotes)
    }
}
