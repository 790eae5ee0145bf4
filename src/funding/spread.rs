//! Top-spread ranking across joined rows.

use rust_decimal::Decimal;
use serde::Serialize;

use super::join::{EnabledExchanges, TableRow};
use super::normalize::CanonicalSymbol;
use crate::exchange::ExchangeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpreadLeg {
    pub exchange: ExchangeId,
    pub rate: Decimal,
}

/// Widest funding spread for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadEntry {
    pub symbol: CanonicalSymbol,
    /// `high.rate - low.rate`, always positive
    pub diff: Decimal,
    pub high: SpreadLeg,
    pub low: SpreadLeg,
    /// Principal times `diff`, per 8h cycle
    pub estimated_profit: Option<Decimal>,
}

impl SpreadEntry {
    /// Highest and lowest rate in `row`, or `None` when fewer than two venues
    /// report or every rate is equal.
    ///
    /// Ties keep the earlier venue in priority order.
    pub fn from_row(
        row: &TableRow,
        enabled: &EnabledExchanges,
        principal_usd: Option<Decimal>,
    ) -> Option<Self> {
        let mut legs = row
            .available(enabled)
            .map(|(exchange, rate)| SpreadLeg { exchange, rate });

        let first = legs.next()?;
        let mut high = first;
        let mut low = first;
        let mut count = 1usize;
        for leg in legs {
            count += 1;
            if leg.rate > high.rate {
                high = leg;
            }
            if leg.rate < low.rate {
                low = leg;
            }
        }
        if count < 2 {
            return None;
        }

        let diff = high.rate.checked_sub(low.rate)?;
        if diff <= Decimal::ZERO {
            return None;
        }

        let estimated_profit = principal_usd
            .filter(|p| *p > Decimal::ZERO)
            .and_then(|p| p.checked_mul(diff));

        Some(Self {
            symbol: row.symbol.clone(),
            diff,
            high,
            low,
            estimated_profit,
        })
    }
}

/// Rank rows by their widest spread, largest first, keeping at most `limit`.
pub fn top_spreads(
    rows: &[TableRow],
    enabled: &EnabledExchanges,
    limit: usize,
    principal_usd: Option<Decimal>,
) -> Vec<SpreadEntry> {
    let mut entries: Vec<SpreadEntry> = rows
        .iter()
        .filter_map(|row| SpreadEntry::from_row(row, enabled, principal_usd))
        .collect();

    // Stable, so equal spreads keep row order
    entries.sort_by(|a, b| b.diff.abs().cmp(&a.diff.abs()));
    entries.truncate(limit);
    entries
}
