//! Runtime scheduling: one poller per venue, the funding board that joins
//! them, and the history collector.

pub mod board;
pub mod history;
pub mod poller;

pub use board::{Board, BoardView};
pub use history::{HistoryCollector, HistorySettings, HistoryView};
pub use poller::{InFlight, InFlightToken, SourcePoller, SourceSlot};
