//! Column model, sorting and paging for the dashboard tables.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::ops::Range;

use crate::exchange::ExchangeId;
use crate::funding::{all_pairs, EnabledExchanges, ExchangePair, HistoryRow, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Asc => "^",
            SortDirection::Desc => "v",
        }
    }
}

/// A sortable table column.
///
/// Numeric columns always sort by absolute value, largest first, with absent
/// values last. Text columns toggle between ascending and descending.
pub trait SortColumn: Copy + PartialEq {
    type Row;

    fn label(&self) -> String;

    /// Numeric value of `row` in this column; `None` for text columns and
    /// absent values.
    fn value(&self, row: &Self::Row) -> Option<Decimal>;

    /// Text value of `row`; only text columns return `Some`.
    fn text<'a>(&self, row: &'a Self::Row) -> Option<&'a str>;

    fn is_text(&self) -> bool;
}

/// Funding board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Symbol,
    Rate(ExchangeId),
    Arb(ExchangePair),
}

impl SortColumn for Column {
    type Row = TableRow;

    fn label(&self) -> String {
        match self {
            Column::Symbol => "Symbol".to_string(),
            Column::Rate(ex) => ex.to_string(),
            Column::Arb(pair) => pair.short_label(),
        }
    }

    fn value(&self, row: &TableRow) -> Option<Decimal> {
        match self {
            Column::Symbol => None,
            Column::Rate(ex) => row.rate(*ex),
            Column::Arb(pair) => row.arb(*pair),
        }
    }

    fn text<'a>(&self, row: &'a TableRow) -> Option<&'a str> {
        match self {
            Column::Symbol => Some(row.symbol.as_str()),
            _ => None,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, Column::Symbol)
    }
}

/// History board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryColumn {
    Symbol,
    Current,
    Average,
    SevenDay,
    Profit,
}

impl HistoryColumn {
    pub const ALL: [HistoryColumn; 5] = [
        HistoryColumn::Symbol,
        HistoryColumn::Current,
        HistoryColumn::Average,
        HistoryColumn::SevenDay,
        HistoryColumn::Profit,
    ];
}

impl SortColumn for HistoryColumn {
    type Row = HistoryRow;

    fn label(&self) -> String {
        match self {
            HistoryColumn::Symbol => "Symbol",
            HistoryColumn::Current => "Current",
            HistoryColumn::Average => "7d Avg",
            HistoryColumn::SevenDay => "7d Sum",
            HistoryColumn::Profit => "7d Profit",
        }
        .to_string()
    }

    fn value(&self, row: &HistoryRow) -> Option<Decimal> {
        match self {
            HistoryColumn::Symbol => None,
            HistoryColumn::Current => row.current_rate,
            HistoryColumn::Average => row.average_rate,
            HistoryColumn::SevenDay => row.seven_day_rate,
            HistoryColumn::Profit => row.seven_day_profit,
        }
    }

    fn text<'a>(&self, row: &'a HistoryRow) -> Option<&'a str> {
        match self {
            HistoryColumn::Symbol => Some(row.symbol.as_str()),
            _ => None,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, HistoryColumn::Symbol)
    }
}

/// A column with its keyboard shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec<C> {
    pub column: C,
    pub shortcut: Option<char>,
}

/// `1`-`9`, then `a`-`z`.
pub fn shortcut_for(index: usize) -> Option<char> {
    match index {
        0..=8 => char::from_digit(index as u32 + 1, 10),
        9..=34 => char::from_u32('a' as u32 + (index - 9) as u32),
        _ => None,
    }
}

pub fn with_shortcuts<C: Copy>(columns: impl IntoIterator<Item = C>) -> Vec<ColumnSpec<C>> {
    columns
        .into_iter()
        .enumerate()
        .map(|(i, column)| ColumnSpec {
            column,
            shortcut: shortcut_for(i),
        })
        .collect()
}

/// Symbol, then one rate column per enabled venue, then one arb column per pair.
pub fn columns(enabled: &EnabledExchanges) -> Vec<ColumnSpec<Column>> {
    let mut cols = vec![Column::Symbol];
    cols.extend(enabled.iter().copied().map(Column::Rate));
    cols.extend(all_pairs(enabled).into_iter().map(Column::Arb));
    with_shortcuts(cols)
}

pub fn history_columns() -> Vec<ColumnSpec<HistoryColumn>> {
    with_shortcuts(HistoryColumn::ALL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<C> {
    pub column: C,
    pub direction: SortDirection,
}

/// Header selection and sort state for one table.
#[derive(Debug, Clone)]
pub struct TableSorter<C> {
    columns: Vec<ColumnSpec<C>>,
    state: SortState<C>,
    selected: usize,
}

impl<C: SortColumn> TableSorter<C> {
    /// Start sorted by `default`, or by the first column if `default` is not
    /// one of `columns`.
    ///
    /// Returns `None` for an empty column list.
    pub fn new(columns: Vec<ColumnSpec<C>>, default: C) -> Option<Self> {
        let selected = columns
            .iter()
            .position(|spec| spec.column == default)
            .unwrap_or(0);
        let column = columns.get(selected)?.column;
        Some(Self {
            columns,
            state: SortState {
                column,
                direction: SortDirection::Desc,
            },
            selected,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec<C>] {
        &self.columns
    }

    pub fn state(&self) -> SortState<C> {
        self.state
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.columns.len();
    }

    pub fn select_previous(&mut self) {
        self.selected = self
            .selected
            .checked_sub(1)
            .unwrap_or(self.columns.len() - 1);
    }

    /// Sort by the column at `index` and select it.
    ///
    /// Numeric columns lock to descending; re-toggling the active text column
    /// flips its direction.
    pub fn toggle(&mut self, index: usize) {
        let Some(spec) = self.columns.get(index) else {
            return;
        };
        let column = spec.column;
        self.selected = index;

        let direction = if column.is_text() && self.state.column == column {
            self.state.direction.toggled()
        } else {
            SortDirection::Desc
        };
        self.state = SortState { column, direction };
    }

    pub fn toggle_selected(&mut self) {
        self.toggle(self.selected);
    }

    /// Toggle the column bound to `key`. Returns whether a column matched.
    pub fn shortcut(&mut self, key: char) -> bool {
        match self.columns.iter().position(|spec| spec.shortcut == Some(key)) {
            Some(index) => {
                self.toggle(index);
                true
            }
            None => false,
        }
    }

    /// Stable sort of `rows` by the active column.
    pub fn sort(&self, rows: &mut [C::Row]) {
        let SortState { column, direction } = self.state;
        if column.is_text() {
            rows.sort_by(|a, b| {
                let ord = compare_text(column.text(a), column.text(b));
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        } else {
            rows.sort_by(|a, b| compare_magnitude(column.value(a), column.value(b)));
        }
    }

    /// Header label with the sort arrow on the active column.
    pub fn header_label(&self, index: usize) -> String {
        let Some(spec) = self.columns.get(index) else {
            return String::new();
        };
        let mut label = spec.column.label();
        if let Some(key) = spec.shortcut {
            label = format!("{} [{}]", label, key);
        }
        if spec.column == self.state.column {
            label = format!("{} {}", label, self.state.direction.arrow());
        }
        label
    }
}

/// First rate column, else first arb column, else symbol.
pub fn default_sort_column(columns: &[ColumnSpec<Column>]) -> Column {
    let find = |pred: fn(&Column) -> bool| columns.iter().map(|s| s.column).find(|c| pred(c));
    find(|c| matches!(c, Column::Rate(_)))
        .or_else(|| find(|c| matches!(c, Column::Arb(_))))
        .unwrap_or(Column::Symbol)
}

fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.to_uppercase().cmp(&b.to_uppercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Larger magnitude first, absent last.
fn compare_magnitude(a: Option<Decimal>, b: Option<Decimal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.abs().cmp(&a.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Visible window over a sorted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub rows_per_page: usize,
}

impl Viewport {
    pub fn new(rows_per_page: usize) -> Self {
        Self {
            offset: 0,
            rows_per_page: rows_per_page.max(1),
        }
    }

    fn max_offset(&self, total: usize) -> usize {
        total.saturating_sub(self.rows_per_page)
    }

    pub fn scroll_up(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }

    pub fn scroll_down(&mut self, total: usize) {
        self.offset = (self.offset + 1).min(self.max_offset(total));
    }

    pub fn page_up(&mut self) {
        self.offset = self.offset.saturating_sub(self.rows_per_page);
    }

    pub fn page_down(&mut self, total: usize) {
        self.offset = (self.offset + self.rows_per_page).min(self.max_offset(total));
    }

    /// Pull the offset back after the table shrank.
    pub fn clamp(&mut self, total: usize) {
        self.offset = self.offset.min(self.max_offset(total));
    }

    pub fn range(&self, total: usize) -> Range<usize> {
        let start = self.offset.min(total);
        let end = (start + self.rows_per_page).min(total);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::{join, CanonicalSymbol, JoinPolicy, RateMap};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn enabled(venues: &[ExchangeId]) -> EnabledExchanges {
        venues.iter().copied().collect()
    }

    fn rows() -> Vec<TableRow> {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Grvt]);
        let map = |entries: &[(&str, Decimal)]| -> RateMap {
            entries.iter().map(|(s, r)| (CanonicalSymbol::parse(s), *r)).collect()
        };
        let mut maps = HashMap::new();
        maps.insert(
            ExchangeId::Binance,
            map(&[("BTC", dec!(0.0001)), ("ETH", dec!(-0.0009)), ("SOL", dec!(0.0004))]),
        );
        maps.insert(
            ExchangeId::Lighter,
            map(&[("BTC", dec!(0.0002)), ("ETH", dec!(0.0001)), ("DOGE", dec!(0.0001))]),
        );
        maps.insert(ExchangeId::Grvt, map(&[("SOL", dec!(0)), ("DOGE", dec!(0.0003))]));
        join(&maps, &venues, JoinPolicy::default())
    }

    fn symbols(rows: &[TableRow]) -> Vec<&str> {
        rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn test_columns_and_shortcuts() {
        let cols = columns(&enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Edgex]));
        // symbol + 3 rates + 3 pairs
        assert_eq!(cols.len(), 7);
        assert_eq!(cols[0].column, Column::Symbol);
        assert_eq!(cols[1].column, Column::Rate(ExchangeId::Binance));
        assert_eq!(
            cols[4].column,
            Column::Arb(ExchangePair::new(ExchangeId::Binance, ExchangeId::Lighter).unwrap())
        );
        assert_eq!(cols[0].shortcut, Some('1'));
        assert_eq!(cols[6].shortcut, Some('7'));

        let all = columns(&ExchangeId::ALL.into_iter().collect());
        // symbol + 6 rates + 15 pairs
        assert_eq!(all.len(), 22);
        assert_eq!(all[8].shortcut, Some('9'));
        assert_eq!(all[9].shortcut, Some('a'));
        assert_eq!(all[21].shortcut, Some('m'));
    }

    #[test]
    fn test_shortcut_range() {
        assert_eq!(shortcut_for(0), Some('1'));
        assert_eq!(shortcut_for(34), Some('z'));
        assert_eq!(shortcut_for(35), None);
    }

    #[test]
    fn test_default_sort_prefers_rate_column() {
        let cols = columns(&enabled(&[ExchangeId::Lighter, ExchangeId::Grvt]));
        assert_eq!(default_sort_column(&cols), Column::Rate(ExchangeId::Lighter));
        assert_eq!(default_sort_column(&with_shortcuts([Column::Symbol])), Column::Symbol);
    }

    #[test]
    fn test_rate_sort_is_abs_desc_with_absent_last() {
        let cols = columns(&enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Grvt]));
        let mut sorter = TableSorter::new(cols, Column::Rate(ExchangeId::Binance)).unwrap();
        let mut table = rows();
        sorter.sort(&mut table);
        assert_eq!(symbols(&table), vec!["ETH", "SOL", "BTC", "DOGE"]);

        // Toggling a numeric column keeps it descending
        sorter.toggle(sorter.selected());
        assert_eq!(sorter.state().direction, SortDirection::Desc);
    }

    #[test]
    fn test_arb_sort() {
        let venues = enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Grvt]);
        let pair = ExchangePair::new(ExchangeId::Binance, ExchangeId::Lighter).unwrap();
        let mut sorter = TableSorter::new(columns(&venues), Column::Symbol).unwrap();
        let index = sorter
            .columns()
            .iter()
            .position(|s| s.column == Column::Arb(pair))
            .unwrap();
        sorter.toggle(index);

        let mut table = rows();
        sorter.sort(&mut table);
        // ETH: -0.001, BTC: -0.0001, then rows without a BN-LT value
        assert_eq!(&symbols(&table)[..2], &["ETH", "BTC"]);
    }

    #[test]
    fn test_symbol_sort_toggles() {
        let cols = columns(&enabled(&[ExchangeId::Binance, ExchangeId::Lighter, ExchangeId::Grvt]));
        let mut sorter = TableSorter::new(cols, Column::Rate(ExchangeId::Binance)).unwrap();
        assert!(sorter.shortcut('1'));
        assert_eq!(sorter.state().direction, SortDirection::Desc);

        let mut table = rows();
        sorter.sort(&mut table);
        assert_eq!(symbols(&table), vec!["SOL", "ETH", "DOGE", "BTC"]);

        sorter.toggle_selected();
        sorter.sort(&mut table);
        assert_eq!(symbols(&table), vec!["BTC", "DOGE", "ETH", "SOL"]);
        assert!(!sorter.shortcut('z'));
    }

    #[test]
    fn test_header_selection_wraps() {
        let mut sorter = TableSorter::new(history_columns(), HistoryColumn::Average).unwrap();
        assert_eq!(sorter.selected(), 2);
        sorter.select_next();
        sorter.select_next();
        sorter.select_next();
        assert_eq!(sorter.selected(), 0);
        sorter.select_previous();
        assert_eq!(sorter.selected(), 4);
        assert_eq!(sorter.header_label(2), "7d Avg [3] v");
        assert_eq!(sorter.header_label(0), "Symbol [1]");
    }

    #[test]
    fn test_viewport_clamps() {
        let mut view = Viewport::new(10);
        view.page_down(25);
        assert_eq!(view.range(25), 10..20);
        view.page_down(25);
        assert_eq!(view.range(25), 15..25);
        view.scroll_down(25);
        assert_eq!(view.offset, 15);
        view.page_up();
        view.page_up();
        assert_eq!(view.offset, 0);
        view.scroll_up();
        assert_eq!(view.offset, 0);

        view.offset = 15;
        view.clamp(12);
        assert_eq!(view.range(12), 2..12);
        view.clamp(3);
        assert_eq!(view.range(3), 0..3);
    }
}
