//! Per-venue polling tasks.
//!
//! Each venue gets its own timer and its own [`SourceSlot`] published through
//! a `watch` channel. A slow venue only delays its own slot.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::exchange::{ExchangeId, FundingSource};
use crate::funding::{rate_map, RateMap};

/// Latest state of one venue.
#[derive(Debug, Clone, Default)]
pub struct SourceSlot {
    /// Rates from the last successful fetch
    pub rates: RateMap,
    /// Error from the most recent fetch, cleared on success
    pub error: Option<String>,
    pub is_refreshing: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SourceSlot {
    pub fn has_data(&self) -> bool {
        !self.rates.is_empty()
    }
}

/// Re-entrancy guard: at most one fetch per source at a time.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    /// `None` when a fetch is already running.
    pub fn try_acquire(&self) -> Option<InFlightToken<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightToken(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop.
#[derive(Debug)]
pub struct InFlightToken<'a>(&'a AtomicBool);

impl Drop for InFlightToken<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls one [`FundingSource`] into its slot.
pub struct SourcePoller {
    source: Arc<dyn FundingSource>,
    slot: watch::Sender<SourceSlot>,
    in_flight: InFlight,
}

impl SourcePoller {
    pub fn new(source: Arc<dyn FundingSource>) -> Arc<Self> {
        let (slot, _) = watch::channel(SourceSlot::default());
        Arc::new(Self {
            source,
            slot,
            in_flight: InFlight::default(),
        })
    }

    pub fn exchange(&self) -> ExchangeId {
        self.source.exchange()
    }

    pub fn subscribe(&self) -> watch::Receiver<SourceSlot> {
        self.slot.subscribe()
    }

    /// Fetch once and write the slot.
    ///
    /// Returns `false` without fetching when the previous fetch is still
    /// running. A failed fetch keeps the previous rates and only replaces the
    /// error.
    pub async fn refresh_once(&self) -> bool {
        let exchange = self.exchange();
        let Some(_token) = self.in_flight.try_acquire() else {
            debug!(%exchange, "Previous fetch still running, skipping tick");
            return false;
        };

        self.slot.send_modify(|slot| slot.is_refreshing = true);

        match self.source.fetch_quotes().await {
            Ok(quotes) => {
                let rates = rate_map(&quotes);
                debug!(%exchange, symbols = rates.len(), "Source refreshed");
                self.slot.send_modify(|slot| {
                    slot.rates = rates;
                    slot.error = None;
                    slot.is_refreshing = false;
                    slot.last_updated = Some(Utc::now());
                });
            }
            Err(e) => {
                warn!(%exchange, error = %e, "Funding fetch failed, keeping previous rates");
                let message = format!("{:#}", e);
                self.slot.send_modify(|slot| {
                    slot.error = Some(message);
                    slot.is_refreshing = false;
                });
            }
        }
        true
    }

    /// Poll on a fixed interval until `shutdown` flips; the first tick fires
    /// immediately.
    ///
    /// Each tick runs on its own task so a long fetch never delays the
    /// timer; overlapping ticks are dropped by the in-flight guard.
    pub fn spawn(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let exchange = self.exchange();
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(%exchange, interval_secs = every.as_secs(), "Starting source poller");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let poller = Arc::clone(&self);
                        tokio::spawn(async move {
                            poller.refresh_once().await;
                        });
                    }
                    _ = shutdown.changed() => {
                        info!(%exchange, "Source poller stopping");
                        break;
                    }
                }
            }
        })
    }
}
