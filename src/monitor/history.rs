//! Lighter funding history collection.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::poller::InFlight;
use crate::exchange::{HistorySource, HistoryWindow};
use crate::funding::{
    build_history, dedupe_markets, dedupe_rows, partial_failure_message, ExcludedSymbols,
    HistoryRow, MarketFailure,
};
use crate::persistence::{HistorySnapshot, SnapshotStore};

/// Published state of the history board.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    pub rows: Vec<HistoryRow>,
    pub error: Option<String>,
    pub is_refreshing: bool,
    pub last_updated: Option<DateTime<Utc>>,
    /// `(done, total)` markets of the running cycle
    pub progress: Option<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct HistorySettings {
    pub lookback: Duration,
    pub count_back: u32,
    /// Pause between per-market requests
    pub fetch_gap: Duration,
    pub principal: Decimal,
    pub excluded: ExcludedSymbols,
}

pub struct HistoryCollector {
    source: Arc<dyn HistorySource>,
    view: watch::Sender<HistoryView>,
    settings: HistorySettings,
    store: Option<SnapshotStore>,
    in_flight: InFlight,
}

impl HistoryCollector {
    pub fn new(
        source: Arc<dyn HistorySource>,
        settings: HistorySettings,
        store: Option<SnapshotStore>,
    ) -> Self {
        let (view, _) = watch::channel(HistoryView::default());
        Self {
            source,
            view,
            settings,
            store,
            in_flight: InFlight::default(),
        }
    }

    /// Show saved rows until the first cycle publishes.
    ///
    /// Rows are re-derived for the current principal and filtered by the
    /// excluded list, which may have changed since the save.
    pub fn with_snapshot(self, snapshot: HistorySnapshot) -> Self {
        let principal = self.settings.principal;
        let rows = dedupe_rows(snapshot.rows)
            .into_iter()
            .map(|row| row.rederive(principal))
            .collect();
        let rows = self.settings.excluded.retain(rows);
        self.view.send_replace(HistoryView {
            rows,
            last_updated: Some(snapshot.last_updated),
            ..HistoryView::default()
        });
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryView> {
        self.view.subscribe()
    }

    /// Collect every market once.
    ///
    /// Markets are fetched one at a time with `fetch_gap` between requests
    /// and the view is republished after each market. Returns `false` when a
    /// cycle was already running.
    pub async fn run_cycle(&self) -> bool {
        let Some(_token) = self.in_flight.try_acquire() else {
            debug!("History cycle still running, skipping");
            return false;
        };

        self.view.send_modify(|v| {
            v.is_refreshing = true;
            v.error = None;
        });

        let markets = match self.source.markets().await {
            Ok(markets) => markets,
            Err(e) => {
                warn!(error = %e, "Failed to load history markets");
                let message = format!("{:#}", e);
                self.view.send_modify(|v| {
                    v.error = Some(message);
                    v.is_refreshing = false;
                    v.progress = None;
                });
                return true;
            }
        };

        let markets: Vec<_> = dedupe_markets(markets)
            .into_iter()
            .filter(|m| !self.settings.excluded.contains(&m.symbol))
            .collect();
        if markets.is_empty() {
            warn!("History source returned no markets");
            self.view.send_modify(|v| {
                v.error = Some("No Lighter markets available".to_string());
                v.is_refreshing = false;
                v.progress = None;
            });
            return true;
        }

        let total = markets.len();
        info!(markets = total, "Starting history cycle");
        let window = self.window(Utc::now());
        let mut rows: Vec<HistoryRow> = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (index, market) in markets.iter().enumerate() {
            match self.source.history(market.market_id, window).await {
                Ok(points) => {
                    let row = build_history(market, &points, self.settings.principal);
                    debug!(symbol = %market.symbol, points = row.series.len(), "Collected history");
                    rows.push(row);
                    let partial = rows.clone();
                    let error = partial_failure_message(&failures);
                    self.view.send_modify(|v| {
                        v.rows = partial;
                        v.error = error;
                        v.progress = Some((index + 1, total));
                    });
                }
                Err(e) => {
                    warn!(symbol = %market.symbol, error = %e, "History fetch failed");
                    failures.push(MarketFailure {
                        symbol: market.symbol.clone(),
                        reason: format!("{:#}", e),
                    });
                    let error = partial_failure_message(&failures);
                    self.view.send_modify(|v| {
                        v.error = error;
                        v.progress = Some((index + 1, total));
                    });
                }
            }

            if index + 1 < total && !self.settings.fetch_gap.is_zero() {
                tokio::time::sleep(self.settings.fetch_gap).await;
            }
        }

        let error = partial_failure_message(&failures);
        let now = Utc::now();
        info!(
            rows = rows.len(),
            failed = failures.len(),
            "History cycle complete"
        );

        if rows.is_empty() {
            // Nothing collected; keep whatever was shown before.
            self.view.send_modify(|v| {
                v.error = error;
                v.is_refreshing = false;
                v.progress = None;
            });
            return true;
        }

        if let Some(store) = &self.store {
            let snapshot = HistorySnapshot {
                rows: rows.clone(),
                last_updated: now,
            };
            let store = store.clone();
            let saved = tokio::task::spawn_blocking(move || store.save_history(&snapshot)).await;
            match saved {
                Ok(Err(e)) => warn!(error = %e, "Failed to save history snapshot"),
                Err(e) => warn!(error = %e, "History snapshot task failed"),
                Ok(Ok(())) => {}
            }
        }

        self.view.send_modify(|v| {
            v.rows = rows;
            v.error = error;
            v.is_refreshing = false;
            v.last_updated = Some(now);
            v.progress = None;
        });
        true
    }

    /// Run a cycle now and then every `every` until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = every.as_secs(), "Starting history collector");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let collector = Arc::clone(&self);
                        tokio::spawn(async move {
                            collector.run_cycle().await;
                        });
                    }
                    _ = shutdown.changed() => {
                        info!("History collector stopping");
                        break;
                    }
                }
            }
        })
    }

    fn window(&self, now: DateTime<Utc>) -> HistoryWindow {
        let lookback = ChronoDuration::from_std(self.settings.lookback)
            .unwrap_or_else(|_| ChronoDuration::hours(24 * 7));
        HistoryWindow {
            start_ms: (now - lookback).timestamp_millis(),
            end_ms: now.timestamp_millis(),
            count_back: self.settings.count_back,
        }
    }
}
