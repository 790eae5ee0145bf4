//! Hyperliquid REST API client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use super::types::*;
use crate::exchange::http::{base_url, build_client, decode};
use crate::exchange::{ExchangeId, FundingSource};
use crate::funding::{FundingQuote, Normalizer, RawQuote};

/// Base URL for Hyperliquid mainnet API.
const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";

/// Hyperliquid pays funding every hour.
const FUNDING_INTERVAL_HOURS: Decimal = Decimal::ONE;

/// Hyperliquid API client for fetching market data.
#[derive(Debug, Clone)]
pub struct HyperliquidClient {
    client: Client,
    base_url: String,
}

impl HyperliquidClient {
    /// Create a new Hyperliquid client for mainnet.
    pub fn new() -> Result<Self> {
        Self::with_base_url(MAINNET_API_URL)
    }

    /// Create a new Hyperliquid client with a custom base URL.
    pub fn with_base_url(url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url(url),
        })
    }

    /// Get metadata and asset contexts for all perpetuals.
    #[instrument(skip(self), name = "hl_meta_and_asset_ctxs")]
    pub async fn get_meta_and_asset_ctxs(&self) -> Result<MetaAndAssetCtxsResponse> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&InfoRequest::MetaAndAssetCtxs)
            .send()
            .await
            .context("Failed to send metaAndAssetCtxs request")?;

        let data: MetaAndAssetCtxsResponse =
            decode(response, "Hyperliquid", "metaAndAssetCtxs").await?;

        debug!("Fetched {} assets from Hyperliquid", data.0.universe.len());
        Ok(data)
    }
}

/// Pair each listed asset with its context and normalize the hourly rate.
pub fn normalize_assets(meta: &Meta, ctxs: &[AssetCtx]) -> Result<Vec<FundingQuote>> {
    if meta.universe.len() != ctxs.len() {
        anyhow::bail!(
            "Mismatch between universe ({}) and contexts ({})",
            meta.universe.len(),
            ctxs.len()
        );
    }

    let raw = meta
        .universe
        .iter()
        .zip(ctxs)
        .filter(|(asset, _)| !asset.is_delisted)
        .filter_map(|(asset, ctx)| {
            Some(RawQuote {
                symbol: &asset.name,
                rate: ctx.funding.as_ref()?,
                interval_hours: Some(FUNDING_INTERVAL_HOURS),
                next_funding_time: None,
            })
        });

    Ok(Normalizer::new(ExchangeId::Hyperliquid, Utc::now()).quotes(raw))
}

#[async_trait]
impl FundingSource for HyperliquidClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Hyperliquid
    }

    #[instrument(skip(self), name = "hl_fetch_quotes")]
    async fn fetch_quotes(&self) -> Result<Vec<FundingQuote>> {
        let (meta, ctxs) = self.get_meta_and_asset_ctxs().await?;
        let quotes = normalize_assets(&meta, &ctxs)?;
        info!("Fetched {} Hyperliquid funding rates", quotes.len());
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const META_AND_CTXS: &str = r#"[
        {"universe": [
            {"name": "BTC", "szDecimals": 5, "maxLeverage": 40},
            {"name": "kPEPE", "szDecimals": 0, "maxLeverage": 10},
            {"name": "DOGE", "szDecimals": 0, "maxLeverage": 10},
            {"name": "FTM", "szDecimals": 0, "maxLeverage": 3, "isDelisted": true}
        ]},
        [
            {"funding": "0.0000125", "markPx": "64000.0"},
            {"funding": "-0.00005", "markPx": "0.012"},
            {"funding": null, "markPx": "0.16"},
            {"funding": "0.01", "markPx": "0.7"}
        ]
    ]"#;

    #[tokio::test]
    async fn test_fetch_quotes_scales_hourly_and_maps_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .and(body_json(serde_json::json!({"type": "metaAndAssetCtxs"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(META_AND_CTXS))
            .mount(&server)
            .await;

        let client = HyperliquidClient::with_base_url(&server.uri()).unwrap();
        let quotes = client.fetch_quotes().await.unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol.as_str(), "BTC");
        assert_eq!(quotes[0].rate, dec!(0.0001));
        assert_eq!(quotes[1].symbol.as_str(), "1000PEPE");
        assert_eq!(quotes[1].rate, dec!(-0.0004));
    }

    #[test]
    fn test_normalize_assets_rejects_misaligned_payload() {
        let (meta, mut ctxs): MetaAndAssetCtxsResponse = serde_json::from_str(META_AND_CTXS).unwrap();
        ctxs.pop();
        assert!(normalize_assets(&meta, &ctxs).is_err());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let client = HyperliquidClient::with_base_url(&server.uri()).unwrap();
        let err = client.fetch_quotes().await.unwrap_err();
        assert!(err.to_string().contains("Hyperliquid API error 500"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_fetch() {
        let client = HyperliquidClient::new().unwrap();
        let quotes = client.fetch_quotes().await.unwrap();

        assert!(!quotes.is_empty());
        let btc = quotes.iter().find(|q| q.symbol.as_str() == "BTC");
        assert!(btc.is_some());
        println!("BTC funding rate (8h): {}", btc.unwrap().rate);
    }
}
