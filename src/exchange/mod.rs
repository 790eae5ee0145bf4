//! Exchange integrations for funding rate collection.
//!
//! Every client is read-only and unauthenticated, and implements
//! [`FundingSource`]. Lighter also implements [`HistorySource`].
//!
//! | Venue | Native interval |
//! |---|---|
//! | Binance, Aster | per symbol, 8h default |
//! | Lighter | 8h |
//! | Hyperliquid | 1h |
//! | edgeX | per contract, 4h default |
//! | GRVT | per instrument, 8h default |

mod client;
pub mod edgex;
pub mod grvt;
mod http;
pub mod hyperliquid;
pub mod lighter;
mod traits;
mod types;

pub use client::{normalize_entries, FapiClient};
pub use edgex::EdgexClient;
pub use grvt::GrvtClient;
pub use hyperliquid::HyperliquidClient;
pub use lighter::LighterClient;
pub use traits::*;
pub use types::*;

use anyhow::Result;
use std::sync::Arc;

use crate::config::ExchangesConfig;

/// Build the live client for `exchange`.
pub fn source_for(exchange: ExchangeId, config: &ExchangesConfig) -> Result<Arc<dyn FundingSource>> {
    Ok(match exchange {
        ExchangeId::Binance => Arc::new(FapiClient::binance()?),
        ExchangeId::Lighter => Arc::new(LighterClient::new()?),
        ExchangeId::Hyperliquid => Arc::new(HyperliquidClient::new()?),
        ExchangeId::Edgex => Arc::new(EdgexClient::new()?.with_fetch_gap(config.edgex_fetch_gap())),
        ExchangeId::Grvt => Arc::new(GrvtClient::new()?),
        ExchangeId::Aster => Arc::new(FapiClient::aster()?),
    })
}
