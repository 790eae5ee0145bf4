//! JSON snapshots for cold-start display.
//!
//! Persists the last good state of each board so a restart can show data
//! before the first fetch completes:
//! - Joined funding rows (`funding-snapshot.json`)
//! - Lighter funding history rows (`lighter-history-snapshot.json`)
//!
//! Snapshots are a cache. Callers log load and save failures and carry on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::funding::{HistoryRow, TableRow};

const FUNDING_SNAPSHOT_FILE: &str = "funding-snapshot.json";
const HISTORY_SNAPSHOT_FILE: &str = "lighter-history-snapshot.json";

/// Last successful join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSnapshot {
    pub rows: Vec<TableRow>,
    pub last_updated: DateTime<Utc>,
}

/// Last completed history cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub rows: Vec<HistoryRow>,
    pub last_updated: DateTime<Utc>,
}

/// Reads and writes snapshot files in one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn funding_path(&self) -> PathBuf {
        self.dir.join(FUNDING_SNAPSHOT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_SNAPSHOT_FILE)
    }

    pub fn save_funding(&self, snapshot: &FundingSnapshot) -> Result<()> {
        write_json(&self.funding_path(), snapshot)?;
        debug!(rows = snapshot.rows.len(), "Saved funding snapshot");
        Ok(())
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load_funding(&self) -> Result<Option<FundingSnapshot>> {
        let snapshot: Option<FundingSnapshot> = read_json(&self.funding_path())?;
        if let Some(s) = &snapshot {
            info!(rows = s.rows.len(), last_updated = %s.last_updated, "Loaded funding snapshot");
        }
        Ok(snapshot)
    }

    pub fn save_history(&self, snapshot: &HistorySnapshot) -> Result<()> {
        write_json(&self.history_path(), snapshot)?;
        debug!(rows = snapshot.rows.len(), "Saved history snapshot");
        Ok(())
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load_history(&self) -> Result<Option<HistorySnapshot>> {
        let snapshot: Option<HistorySnapshot> = read_json(&self.history_path())?;
        if let Some(s) = &snapshot {
            info!(rows = s.rows.len(), last_updated = %s.last_updated, "Loaded history snapshot");
        }
        Ok(snapshot)
    }
}

/// Serialize to a temp file next to `path`, then rename over it.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize snapshot")?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
        file.write_all(&bytes)
            .with_context(|| format!("Failed to write to temp file: {:?}", temp_path))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync temp file: {:?}", temp_path))?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .with_context(|| format!("Failed to parse snapshot {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeId;
    use crate::funding::{build_history, join, EnabledExchanges, JoinPolicy, MarketRef, RateMap};
    use crate::funding::{CanonicalSymbol, Direction, RawHistoryPoint};
    use crate::utils::decimal::RawNumber;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn sample_rows() -> Vec<TableRow> {
        let enabled: EnabledExchanges = [ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Grvt].into();
        let rates = |pairs: &[(&str, Decimal)]| -> RateMap {
            pairs.iter().map(|(s, r)| (CanonicalSymbol::parse(s), *r)).collect()
        };
        let mut maps = HashMap::new();
        maps.insert(ExchangeId::Binance, rates(&[("BTC", dec!(0.0001)), ("ETH", dec!(-0.00025))]));
        maps.insert(ExchangeId::Lighter, rates(&[("BTC", dec!(0.00031)), ("ETH", dec!(0.0001))]));
        maps.insert(ExchangeId::Grvt, rates(&[("BTC", dec!(0))]));
        join(&maps, &enabled, JoinPolicy::default())
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_funding_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested"));
        let snapshot = FundingSnapshot {
            rows: sample_rows(),
            last_updated: timestamp(),
        };

        store.save_funding(&snapshot).unwrap();
        let loaded = store.load_funding().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!store.funding_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_snapshot_uses_camel_case_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store
            .save_funding(&FundingSnapshot {
                rows: sample_rows(),
                last_updated: timestamp(),
            })
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.funding_path()).unwrap()).unwrap();
        assert_eq!(raw["lastUpdated"], "2025-03-14T09:26:53Z");
        assert_eq!(raw["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load_funding().unwrap().is_none());
        assert!(store.load_history().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.funding_path(), b"{\"rows\": [").unwrap();
        assert!(store.load_funding().is_err());
    }

    #[test]
    fn test_history_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let market = MarketRef {
            market_id: 1,
            symbol: "ETH".to_string(),
            current_rate: None,
        };
        let points = vec![
            RawHistoryPoint { timestamp: 1, rate: Some(RawNumber::from("0.01")), value: None, direction: Direction::Long },
            RawHistoryPoint { timestamp: 2, rate: Some(RawNumber::from("0.02")), value: None, direction: Direction::Short },
        ];
        let snapshot = HistorySnapshot {
            rows: vec![build_history(&market, &points, dec!(1000))],
            last_updated: timestamp(),
        };

        store.save_history(&snapshot).unwrap();
        assert_eq!(store.load_history().unwrap().unwrap(), snapshot);
    }
}
