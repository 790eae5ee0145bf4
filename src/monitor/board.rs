//! Funding board: joins the venue slots whenever one of them changes.

use chrono::{DateTime, Utc};
use futures_util::future::select_all;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::poller::SourceSlot;
use crate::exchange::ExchangeId;
use crate::funding::{
    join, top_spreads, EnabledExchanges, JoinPolicy, JoinStatus, SpreadEntry, TableRow,
};
use crate::persistence::{FundingSnapshot, SnapshotStore};

/// Everything the dashboard needs to draw the funding board.
#[derive(Debug, Clone, Default)]
pub struct BoardView {
    pub rows: Vec<TableRow>,
    pub spreads: Vec<SpreadEntry>,
    pub status: JoinStatus,
    /// Time of the last non-empty join (or of the loaded snapshot)
    pub last_updated: Option<DateTime<Utc>>,
    /// Latest fetch error per venue, in priority order
    pub errors: Vec<(ExchangeId, String)>,
    /// Venues with a fetch in progress
    pub refreshing: Vec<ExchangeId>,
}

/// Owns the slot receivers and the last good row set.
pub struct Board {
    slots: Vec<(ExchangeId, watch::Receiver<SourceSlot>)>,
    enabled: EnabledExchanges,
    policy: JoinPolicy,
    spread_limit: usize,
    principal: Option<Decimal>,
    rows: Vec<TableRow>,
    last_updated: Option<DateTime<Utc>>,
}

impl Board {
    pub fn new(
        enabled: EnabledExchanges,
        policy: JoinPolicy,
        spread_limit: usize,
        principal: Option<Decimal>,
    ) -> Self {
        Self {
            slots: Vec::new(),
            enabled,
            policy,
            spread_limit,
            principal,
            rows: Vec::new(),
            last_updated: None,
        }
    }

    /// Seed the board with a saved snapshot until live data arrives.
    pub fn with_snapshot(mut self, snapshot: FundingSnapshot) -> Self {
        self.rows = snapshot.rows;
        self.last_updated = Some(snapshot.last_updated);
        self
    }

    /// Watch `exchange`'s slot. Slots of venues that are not enabled are ignored.
    pub fn attach(&mut self, exchange: ExchangeId, slot: watch::Receiver<SourceSlot>) {
        if self.enabled.contains(&exchange) {
            self.slots.push((exchange, slot));
            self.slots.sort_by_key(|(ex, _)| *ex);
        }
    }

    /// View of the current state without reading the slots.
    pub fn view(&self) -> BoardView {
        let status = if self.rows.is_empty() {
            JoinStatus::Idle
        } else {
            JoinStatus::Ready
        };
        BoardView {
            rows: self.rows.clone(),
            spreads: top_spreads(&self.rows, &self.enabled, self.spread_limit, self.principal),
            status,
            last_updated: self.last_updated,
            errors: Vec::new(),
            refreshing: Vec::new(),
        }
    }

    /// Re-join from the current slot contents.
    ///
    /// Rows are rebuilt only once enough venues have data; until then the
    /// previous rows stay on screen. A join with no overlapping symbols
    /// clears them. Returns the view and whether a fresh non-empty join
    /// happened.
    pub fn recompute(&mut self) -> (BoardView, bool) {
        let mut maps = HashMap::new();
        let mut with_data = BTreeSet::new();
        let mut errors = Vec::new();
        let mut refreshing = Vec::new();

        for (exchange, rx) in &mut self.slots {
            let slot = rx.borrow_and_update();
            if slot.has_data() {
                with_data.insert(*exchange);
                maps.insert(*exchange, slot.rates.clone());
            }
            if let Some(error) = &slot.error {
                errors.push((*exchange, error.clone()));
            }
            if slot.is_refreshing {
                refreshing.push(*exchange);
            }
        }

        let reporting = self.enabled.intersection(&with_data).count();
        let mut fresh = false;
        if reporting >= self.policy.min_sources {
            let rows = join(&maps, &self.enabled, self.policy);
            if rows.is_empty() {
                self.rows.clear();
            } else {
                self.rows = rows;
                self.last_updated = Some(Utc::now());
                fresh = true;
            }
        }

        let mut status =
            JoinStatus::from_sources(&self.enabled, &with_data, self.policy, self.rows.len());
        if status == JoinStatus::Idle && !self.rows.is_empty() {
            status = JoinStatus::Ready;
        }

        debug!(
            reporting,
            rows = self.rows.len(),
            ?status,
            "Recomputed funding board"
        );

        let view = BoardView {
            rows: self.rows.clone(),
            spreads: top_spreads(&self.rows, &self.enabled, self.spread_limit, self.principal),
            status,
            last_updated: self.last_updated,
            errors,
            refreshing,
        };
        (view, fresh)
    }

    /// Recompute on every slot change and publish to `view_tx` until shutdown.
    ///
    /// Each fresh join is saved to `store` on a blocking task; a failed save
    /// is logged and otherwise ignored.
    pub async fn run(
        mut self,
        view_tx: watch::Sender<BoardView>,
        store: Option<SnapshotStore>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(sources = self.slots.len(), "Starting funding board");
        view_tx.send_replace(self.view());
        let mut pending_save: Option<JoinHandle<()>> = None;

        loop {
            if self.slots.is_empty() {
                let _ = shutdown.changed().await;
                break;
            }

            let changed = select_all(self.slots.iter_mut().map(|(_, rx)| Box::pin(rx.changed())));
            tokio::select! {
                (result, _, _) = changed => {
                    if result.is_err() {
                        warn!("Source poller dropped, stopping funding board");
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }

            let (view, fresh) = self.recompute();
            if fresh {
                if let (Some(store), Some(last_updated)) = (&store, view.last_updated) {
                    // One writer at a time; saves share the temp file
                    if let Some(previous) = pending_save.take() {
                        let _ = previous.await;
                    }
                    pending_save = Some(save_snapshot(store.clone(), view.rows.clone(), last_updated));
                }
            }

            if view_tx.send(view).is_err() {
                debug!("No board subscribers left");
                break;
            }
        }

        if let Some(save) = pending_save {
            let _ = save.await;
        }
        info!("Funding board stopped");
    }
}

fn save_snapshot(store: SnapshotStore, rows: Vec<TableRow>, last_updated: DateTime<Utc>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let snapshot = FundingSnapshot { rows, last_updated };
        if let Err(e) = store.save_funding(&snapshot) {
            warn!(error = %e, "Failed to save funding snapshot");
        }
    })
}
