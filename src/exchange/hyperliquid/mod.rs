//! Hyperliquid exchange integration.
//!
//! # Funding Rate Notes
//!
//! Hyperliquid funding is paid **hourly** at 1/8th of the computed 8-hour rate.
//! Rates are multiplied by 8 to compare with venues on the 8h schedule.
//!
//! Thousand-unit contracts are listed with a `k` prefix (`kPEPE`), which
//! other venues spell `1000PEPE`.

mod client;
mod types;

pub use client::{normalize_assets, HyperliquidClient};
pub use types::*;
