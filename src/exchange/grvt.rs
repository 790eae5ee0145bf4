//! GRVT market data client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::http::{base_url, build_client, decode};
use super::traits::{ExchangeId, FundingSource};
use crate::funding::{FundingQuote, Normalizer, RawQuote};
use crate::utils::decimal::RawNumber;

const MARKET_DATA_URL: &str = "https://market-data.grvt.io";

/// Funding requests in flight at once.
const MAX_CONCURRENT_REQUESTS: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentsRequest {
    pub kind: Vec<&'static str>,
    pub quote: Vec<&'static str>,
    pub is_active: bool,
}

impl Default for InstrumentsRequest {
    fn default() -> Self {
        Self {
            kind: vec!["PERPETUAL"],
            quote: vec!["USDT"],
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentsResponse {
    #[serde(default)]
    pub result: Vec<Instrument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    /// e.g. `BTC_USDT_Perp`
    pub instrument: String,
    pub base: String,
    #[serde(default)]
    pub funding_interval_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingRequest<'a> {
    pub instrument: &'a str,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingResponse {
    #[serde(default)]
    pub result: Vec<FundingPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingPoint {
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub funding_rate: Option<RawNumber>,
    #[serde(default)]
    pub funding_interval_hours: Option<u32>,
}

/// GRVT API client.
#[derive(Debug, Clone)]
pub struct GrvtClient {
    http: Client,
    base_url: String,
}

impl GrvtClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(MARKET_DATA_URL)
    }

    pub fn with_base_url(url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url(url),
        })
    }

    /// Active USDT perpetuals.
    #[instrument(skip(self), name = "grvt_instruments")]
    pub async fn get_instruments(&self) -> Result<Vec<Instrument>> {
        let url = format!("{}/full/v1/instruments", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&InstrumentsRequest::default())
            .send()
            .await
            .context("Failed to fetch GRVT instruments")?;

        let payload: InstrumentsResponse = decode(response, "GRVT", "instruments").await?;
        debug!("Fetched {} GRVT instruments", payload.result.len());
        Ok(payload.result)
    }

    /// Most recent funding point for one instrument.
    #[instrument(skip(self), name = "grvt_funding")]
    pub async fn get_latest_funding(&self, instrument: &str) -> Result<Option<FundingPoint>> {
        let url = format!("{}/full/v1/funding", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&FundingRequest { instrument, limit: 1 })
            .send()
            .await
            .with_context(|| format!("Failed to fetch funding for {}", instrument))?;

        let payload: FundingResponse = decode(response, "GRVT", "funding").await?;
        Ok(payload.result.into_iter().next())
    }
}

#[async_trait]
impl FundingSource for GrvtClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Grvt
    }

    #[instrument(skip(self), name = "grvt_fetch_quotes")]
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>> {
        let instruments = self.get_instruments().await?;
        let count = instruments.len();

        let results: Vec<(Instrument, Result<Option<FundingPoint>>)> = stream::iter(instruments)
            .map(|instrument| async move {
                let point = self.get_latest_funding(&instrument.instrument).await;
                (instrument, point)
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut points = Vec::with_capacity(results.len());
        let mut last_error = None;
        let mut failed = 0usize;
        for (instrument, result) in results {
            match result {
                Ok(Some(point)) => points.push((instrument, point)),
                Ok(None) => debug!(instrument = %instrument.instrument, "No funding point"),
                Err(e) => {
                    warn!(instrument = %instrument.instrument, error = %e, "GRVT funding request failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            if failed == count {
                return Err(e.context(format!("All {} GRVT funding requests failed", count)));
            }
        }

        let raw = points.iter().filter_map(|(instrument, point)| {
            Some(RawQuote {
                symbol: &instrument.base,
                rate: point.funding_rate.as_ref()?,
                interval_hours: point
                    .funding_interval_hours
                    .or(instrument.funding_interval_hours)
                    .map(Decimal::from),
                next_funding_time: None,
            })
        });
        let quotes = Normalizer::new(ExchangeId::Grvt, Utc::now()).quotes(raw);

        info!(instruments = count, failed, quotes = quotes.len(), "Fetched GRVT funding rates");
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_funding(server: &MockServer, instrument: &str, body: &str) {
        Mock::given(method("POST"))
            .and(path("/full/v1/funding"))
            .and(body_json(serde_json::json!({"instrument": instrument, "limit": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_quotes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/full/v1/instruments"))
            .and(body_json(serde_json::json!({
                "kind": ["PERPETUAL"],
                "quote": ["USDT"],
                "is_active": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"result": [
                    {"instrument": "BTC_USDT_Perp", "base": "BTC", "quote": "USDT", "funding_interval_hours": 8},
                    {"instrument": "ETH_USDT_Perp", "base": "ETH", "quote": "USDT", "funding_interval_hours": 4},
                    {"instrument": "SOL_USDT_Perp", "base": "SOL", "quote": "USDT"},
                    {"instrument": "XRP_USDT_Perp", "base": "XRP", "quote": "USDT"}
                ]}"#,
            ))
            .mount(&server)
            .await;
        mock_funding(
            &server,
            "BTC_USDT_Perp",
            r#"{"result": [{"instrument": "BTC_USDT_Perp", "funding_rate": "0.0001", "funding_time": "1700000000000000000"}]}"#,
        )
        .await;
        mock_funding(
            &server,
            "ETH_USDT_Perp",
            r#"{"result": [{"instrument": "ETH_USDT_Perp", "funding_rate": -0.0003}]}"#,
        )
        .await;
        mock_funding(&server, "SOL_USDT_Perp", r#"{"result": []}"#).await;
        // A null rate drops that instrument only
        mock_funding(
            &server,
            "XRP_USDT_Perp",
            r#"{"result": [{"instrument": "XRP_USDT_Perp", "funding_rate": null}]}"#,
        )
        .await;

        let client = GrvtClient::with_base_url(&server.uri()).unwrap();
        let quotes = client.fetch_quotes().await.unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol.as_str(), "BTC");
        assert_eq!(quotes[0].rate, dec!(0.0001));
        assert_eq!(quotes[1].symbol.as_str(), "ETH");
        assert_eq!(quotes[1].rate, dec!(-0.0006));
    }

    #[tokio::test]
    async fn test_instrument_error_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/full/v1/instruments"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = GrvtClient::with_base_url(&server.uri()).unwrap();
        let err = client.fetch_quotes().await.unwrap_err();
        assert!(err.to_string().contains("GRVT API error 502"));
    }
}
