//! # Funding Rate Monitor
//!
//! Terminal dashboard for cross-exchange perpetual funding rate arbitrage.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Read-only REST clients for each venue
//! - `funding`: Rate normalization, cross-venue join, spread ranking, history aggregation
//! - `monitor`: Per-venue pollers, the funding board and the history collector
//! - `persistence`: JSON snapshots for cold-start display
//! - `tui`: ratatui dashboard
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod funding;
pub mod monitor;
pub mod persistence;
pub mod tui;
pub mod utils;

pub use config::Config;
