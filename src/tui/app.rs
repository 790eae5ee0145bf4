//! Screen state and key handling, independent of the terminal.

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rust_decimal::Decimal;

use super::table::{
    columns, default_sort_column, history_columns, Column, ColumnSpec, HistoryColumn, SortColumn,
    TableSorter, Viewport,
};
use crate::funding::{EnabledExchanges, HistoryRow, TableRow};
use crate::monitor::{BoardView, HistoryView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// A sorted, paged table.
#[derive(Debug, Clone)]
pub struct TableState<C: SortColumn> {
    sorter: TableSorter<C>,
    viewport: Viewport,
    rows: Vec<C::Row>,
}

impl<C> TableState<C>
where
    C: SortColumn,
    C::Row: Clone,
{
    pub fn new(columns: Vec<ColumnSpec<C>>, default: C, rows_per_page: usize) -> Result<Self> {
        let sorter = TableSorter::new(columns, default).context("Table has no columns")?;
        Ok(Self {
            sorter,
            viewport: Viewport::new(rows_per_page),
            rows: Vec::new(),
        })
    }

    pub fn set_rows(&mut self, rows: Vec<C::Row>) {
        self.rows = rows;
        self.resort();
    }

    fn resort(&mut self) {
        self.sorter.sort(&mut self.rows);
        self.viewport.clamp(self.rows.len());
    }

    pub fn sorter(&self) -> &TableSorter<C> {
        &self.sorter
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[C::Row] {
        &self.rows
    }

    /// Rows on the current page.
    pub fn visible(&self) -> &[C::Row] {
        &self.rows[self.viewport.range(self.rows.len())]
    }

    /// 1-based `(first, last)` rows on the current page, `None` when empty.
    pub fn row_span(&self) -> Option<(usize, usize)> {
        let range = self.viewport.range(self.rows.len());
        (!range.is_empty()).then(|| (range.start + 1, range.end))
    }

    pub fn is_paged(&self) -> bool {
        self.rows.len() > self.viewport.rows_per_page
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        let total = self.rows.len();
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Action::Quit
            }
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Left => self.sorter.select_previous(),
            KeyCode::Right => self.sorter.select_next(),
            KeyCode::Enter => {
                self.sorter.toggle_selected();
                self.resort();
            }
            KeyCode::Up => self.viewport.scroll_up(),
            KeyCode::Down => self.viewport.scroll_down(total),
            KeyCode::PageUp => self.viewport.page_up(),
            KeyCode::PageDown => self.viewport.page_down(total),
            KeyCode::Char(c) => {
                if self.sorter.shortcut(c) {
                    self.resort();
                }
            }
            _ => {}
        }
        Action::Continue
    }
}

/// Funding board screen.
#[derive(Debug, Clone)]
pub struct FundingScreen {
    pub table: TableState<Column>,
    pub view: BoardView,
    pub enabled: EnabledExchanges,
    pub principal: Option<Decimal>,
}

impl FundingScreen {
    pub fn new(enabled: EnabledExchanges, rows_per_page: usize, principal: Option<Decimal>) -> Result<Self> {
        let cols = columns(&enabled);
        let default = default_sort_column(&cols);
        Ok(Self {
            table: TableState::new(cols, default, rows_per_page)?,
            view: BoardView::default(),
            enabled,
            principal,
        })
    }

    pub fn update(&mut self, mut view: BoardView) {
        let rows: Vec<TableRow> = std::mem::take(&mut view.rows);
        self.table.set_rows(rows);
        self.view = view;
    }

    /// Shortcut range for the instructions line, e.g. `1-9, a-m`.
    pub fn shortcut_hint(&self) -> String {
        shortcut_hint(self.table.sorter().columns())
    }
}

/// Lighter history screen.
#[derive(Debug, Clone)]
pub struct HistoryScreen {
    pub table: TableState<HistoryColumn>,
    pub view: HistoryView,
    pub principal: Decimal,
}

impl HistoryScreen {
    pub fn new(rows_per_page: usize, principal: Decimal) -> Result<Self> {
        Ok(Self {
            table: TableState::new(history_columns(), HistoryColumn::Average, rows_per_page)?,
            view: HistoryView::default(),
            principal,
        })
    }

    pub fn update(&mut self, mut view: HistoryView) {
        let rows: Vec<HistoryRow> = std::mem::take(&mut view.rows);
        self.table.set_rows(rows);
        self.view = view;
    }

    pub fn shortcut_hint(&self) -> String {
        shortcut_hint(self.table.sorter().columns())
    }
}

fn shortcut_hint<C>(specs: &[ColumnSpec<C>]) -> String {
    let keys: Vec<char> = specs.iter().filter_map(|s| s.shortcut).collect();
    let digits: Vec<char> = keys.iter().copied().filter(char::is_ascii_digit).collect();
    let letters: Vec<char> = keys.iter().copied().filter(char::is_ascii_lowercase).collect();

    let span = |group: &[char]| match group {
        [] => None,
        [only] => Some(only.to_string()),
        [first, .., last] => Some(format!("{}-{}", first, last)),
    };
    [span(&digits), span(&letters)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeId;
    use crate::funding::{join, CanonicalSymbol, JoinPolicy, RateMap};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn board_view(count: usize) -> BoardView {
        let enabled: EnabledExchanges = [ExchangeId::Binance, ExchangeId::Lighter].into();
        let mut binance = RateMap::new();
        let mut lighter = RateMap::new();
        for i in 0..count {
            let symbol = CanonicalSymbol::parse(&format!("SYM{:02}", i));
            binance.insert(symbol.clone(), Decimal::new(i as i64, 5));
            lighter.insert(symbol, dec!(0));
        }
        let maps = HashMap::from([(ExchangeId::Binance, binance), (ExchangeId::Lighter, lighter)]);
        BoardView {
            rows: join(&maps, &enabled, JoinPolicy::default()),
            ..BoardView::default()
        }
    }

    fn screen() -> FundingScreen {
        FundingScreen::new([ExchangeId::Binance, ExchangeId::Lighter].into(), 10, None).unwrap()
    }

    #[test]
    fn test_update_sorts_by_default_column() {
        let mut screen = screen();
        screen.update(board_view(25));
        assert_eq!(screen.table.total(), 25);
        assert_eq!(screen.table.visible().len(), 10);
        // Largest Binance rate first
        assert_eq!(screen.table.visible()[0].symbol.as_str(), "SYM24");
        assert!(screen.view.rows.is_empty());
        assert_eq!(screen.table.row_span(), Some((1, 10)));
    }

    #[test]
    fn test_paging_keys() {
        let mut screen = screen();
        screen.update(board_view(25));
        screen.table.handle_key(key(KeyCode::PageDown));
        screen.table.handle_key(key(KeyCode::PageDown));
        assert_eq!(screen.table.row_span(), Some((16, 25)));
        screen.table.handle_key(key(KeyCode::Up));
        assert_eq!(screen.table.row_span(), Some((15, 24)));

        // A shrinking table pulls the page back
        screen.update(board_view(5));
        assert_eq!(screen.table.row_span(), Some((1, 5)));
        assert!(!screen.table.is_paged());
    }

    #[test]
    fn test_column_keys() {
        let mut screen = screen();
        screen.update(board_view(3));
        // Symbol column via shortcut, then flip with Enter
        assert_eq!(screen.table.handle_key(key(KeyCode::Char('1'))), Action::Continue);
        assert_eq!(screen.table.visible()[0].symbol.as_str(), "SYM02");
        screen.table.handle_key(key(KeyCode::Enter));
        assert_eq!(screen.table.visible()[0].symbol.as_str(), "SYM00");

        screen.table.handle_key(key(KeyCode::Left));
        assert_eq!(screen.table.sorter().selected(), 3);
        screen.table.handle_key(key(KeyCode::Right));
        assert_eq!(screen.table.sorter().selected(), 0);
    }

    #[test]
    fn test_quit_keys() {
        let mut screen = screen();
        assert_eq!(screen.table.handle_key(key(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(screen.table.handle_key(key(KeyCode::Esc)), Action::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(screen.table.handle_key(ctrl_c), Action::Quit);
    }

    #[test]
    fn test_shortcut_hint() {
        assert_eq!(screen().shortcut_hint(), "1-4");
        let all = FundingScreen::new(ExchangeId::ALL.into_iter().collect(), 20, None).unwrap();
        assert_eq!(all.shortcut_hint(), "1-9, a-m");
        assert_eq!(HistoryScreen::new(20, dec!(1000)).unwrap().shortcut_hint(), "1-5");
    }
}
