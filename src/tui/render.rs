//! Drawing for the funding and history screens.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use rust_decimal::Decimal;

use super::app::{FundingScreen, HistoryScreen, TableState};
use super::format::{downsample, format_rate, format_updated, format_usd, sparkline, Tone};
use super::table::{Column, SortColumn};
use crate::funding::{HistoryRow, TableRow};

const TITLE: &str = "Funding Rate Monitor";
const SYMBOL_WIDTH: u16 = 12;
const VALUE_WIDTH: u16 = 14;
const TREND_POINTS: usize = 40;

fn rate_style(value: Option<Decimal>) -> Style {
    match value {
        Some(v) if v > Decimal::ZERO => Style::default().fg(Color::Green),
        Some(v) if v < Decimal::ZERO => Style::default().fg(Color::Red),
        Some(_) => Style::default().fg(Color::White),
        None => Style::default().fg(Color::DarkGray),
    }
}

fn header_row<C>(table: &TableState<C>) -> Row<'static>
where
    C: SortColumn,
    C::Row: Clone,
{
    let sorter = table.sorter();
    let active = sorter.state().column;
    let cells: Vec<Cell> = sorter
        .columns()
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let style = if i == sorter.selected() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if spec.column == active {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            };
            Cell::from(Span::styled(sorter.header_label(i), style))
        })
        .collect();
    Row::new(cells)
}

fn footer<C>(f: &mut Frame<'_>, area: Rect, table: &TableState<C>, extra: &str)
where
    C: SortColumn,
    C::Row: Clone,
{
    let mut spans = Vec::new();
    if table.is_paged() {
        if let Some((first, last)) = table.row_span() {
            spans.push(Span::styled(
                format!("Showing rows {}-{} of {}", first, last, table.total()),
                Style::default().fg(Color::Gray),
            ));
            spans.push(Span::raw("  |  "));
        }
    }
    if !extra.is_empty() {
        spans.push(Span::styled(extra.to_string(), Style::default().fg(Color::Gray)));
        spans.push(Span::raw("  |  "));
    }
    spans.push(Span::styled("q: quit", Style::default().fg(Color::DarkGray)));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Funding board
// ---------------------------------------------------------------------------

pub fn render_funding(f: &mut Frame<'_>, screen: &FundingScreen) {
    let spread_height = (screen.view.spreads.len() as u16).max(1) + 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),              // header
            Constraint::Min(6),                 // table
            Constraint::Length(spread_height),  // top spreads
            Constraint::Length(1),              // footer
        ])
        .split(f.area());

    render_funding_header(f, chunks[0], screen);
    render_funding_table(f, chunks[1], screen);
    render_spreads(f, chunks[2], screen);
    footer(f, chunks[3], &screen.table, "");
}

fn render_funding_header(f: &mut Frame<'_>, area: Rect, screen: &FundingScreen) {
    let view = &screen.view;
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                TITLE,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  |  Last update: "),
            Span::styled(format_updated(view.last_updated), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(Span::styled(
            format!(
                "Use ← → or press {} to choose a column, Enter to toggle sort, ↑/↓ to scroll rows, PgUp/PgDn to jump.",
                screen.shortcut_hint()
            ),
            Style::default().fg(Color::Gray),
        )),
    ];

    if !view.refreshing.is_empty() {
        let names: Vec<String> = view.refreshing.iter().map(|ex| ex.to_string()).collect();
        lines.push(Line::from(Span::styled(
            format!("Refreshing: {}", names.join(", ")),
            Style::default().fg(Color::Yellow),
        )));
    }
    for (exchange, error) in &view.errors {
        lines.push(Line::from(Span::styled(
            format!("{} error: {}", exchange, error),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(message) = view.status.message() {
        lines.push(Line::from(Span::styled(message, Style::default().fg(Color::Yellow))));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

fn funding_cell(column: Column, row: &TableRow) -> Cell<'static> {
    match column {
        Column::Symbol => Cell::from(row.symbol.to_string()),
        _ => {
            let value = column.value(row);
            Cell::from(Span::styled(format_rate(value), rate_style(value)))
        }
    }
}

fn render_funding_table(f: &mut Frame<'_>, area: Rect, screen: &FundingScreen) {
    let specs = screen.table.sorter().columns();
    let rows: Vec<Row> = screen
        .table
        .visible()
        .iter()
        .map(|row| Row::new(specs.iter().map(|spec| funding_cell(spec.column, row))))
        .collect();

    let widths: Vec<Constraint> = specs
        .iter()
        .map(|spec| match spec.column {
            Column::Symbol => Constraint::Length(SYMBOL_WIDTH),
            _ => Constraint::Length(VALUE_WIDTH),
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header_row(&screen.table))
        .column_spacing(1)
        .block(Block::default().title(" Funding (8h) ").borders(Borders::ALL));
    f.render_widget(table, area);
}

fn render_spreads(f: &mut Frame<'_>, area: Rect, screen: &FundingScreen) {
    let spreads = &screen.view.spreads;
    let lines: Vec<Line> = if spreads.is_empty() {
        vec![Line::from(Span::styled(
            "No spreads yet",
            Style::default().fg(Color::Gray),
        ))]
    } else {
        spreads
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut spans = vec![
                    Span::raw(format!("{:>2}. {:<12}", i + 1, entry.symbol.as_str())),
                    Span::styled(
                        format!(" {:>10}", format_rate(Some(entry.diff))),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::raw("  long "),
                    Span::styled(
                        format!("{} {}", entry.low.exchange, format_rate(Some(entry.low.rate))),
                        rate_style(Some(entry.low.rate)),
                    ),
                    Span::raw(" / short "),
                    Span::styled(
                        format!("{} {}", entry.high.exchange, format_rate(Some(entry.high.rate))),
                        rate_style(Some(entry.high.rate)),
                    ),
                ];
                if entry.estimated_profit.is_some() {
                    spans.push(Span::raw("  est. "));
                    spans.push(Span::styled(
                        format!("{}/8h", format_usd(entry.estimated_profit)),
                        Style::default().fg(Color::Cyan),
                    ));
                }
                Line::from(spans)
            })
            .collect()
    };

    let title = match screen.principal {
        Some(p) if p > Decimal::ZERO => format!(" Top Spreads (principal {}) ", format_usd(Some(p))),
        _ => " Top Spreads ".to_string(),
    };
    let widget = Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(widget, area);
}

// ---------------------------------------------------------------------------
// History board
// ---------------------------------------------------------------------------

pub fn render_history(f: &mut Frame<'_>, screen: &HistoryScreen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Min(6),    // table
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_history_header(f, chunks[0], screen);
    render_history_table(f, chunks[1], screen);
    footer(
        f,
        chunks[2],
        &screen.table,
        &format!("Principal {}", format_usd(Some(screen.principal))),
    );
}

fn render_history_header(f: &mut Frame<'_>, area: Rect, screen: &HistoryScreen) {
    let view = &screen.view;
    let mut status = vec![
        Span::styled(
            format!("{} - Lighter 7d History", TITLE),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  Last update: "),
        Span::styled(format_updated(view.last_updated), Style::default().fg(Color::Yellow)),
    ];
    if let Some((done, total)) = view.progress {
        status.push(Span::styled(
            format!("  |  Loading {}/{}", done, total),
            Style::default().fg(Color::Yellow),
        ));
    } else if view.is_refreshing {
        status.push(Span::styled("  |  Loading...", Style::default().fg(Color::Yellow)));
    }

    let mut lines = vec![
        Line::from(status),
        Line::from(Span::styled(
            format!(
                "Use ← → or press {} to choose a column, Enter to toggle sort, ↑/↓ to scroll rows, PgUp/PgDn to jump.",
                screen.shortcut_hint()
            ),
            Style::default().fg(Color::Gray),
        )),
    ];
    if let Some(error) = &view.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    } else if screen.table.total() == 0 && !view.is_refreshing {
        lines.push(Line::from(Span::styled(
            "No history yet",
            Style::default().fg(Color::Gray),
        )));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

fn trend_cell(row: &HistoryRow) -> Cell<'static> {
    let series = downsample(&row.series, TREND_POINTS);
    if series.is_empty() {
        return Cell::from(Span::styled("No history", Style::default().fg(Color::Gray)));
    }
    let spans: Vec<Span> = sparkline(&series)
        .into_iter()
        .map(|cell| {
            let color = match cell.tone {
                Tone::Positive => Color::Green,
                Tone::Negative => Color::Red,
                Tone::Flat => Color::Gray,
            };
            Span::styled(cell.glyph.to_string(), Style::default().fg(color))
        })
        .collect();
    Cell::from(Line::from(spans))
}

fn render_history_table(f: &mut Frame<'_>, area: Rect, screen: &HistoryScreen) {
    let rows: Vec<Row> = screen
        .table
        .visible()
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.symbol.clone()),
                Cell::from(Span::styled(format_rate(row.current_rate), rate_style(row.current_rate))),
                Cell::from(Span::styled(format_rate(row.average_rate), rate_style(row.average_rate))),
                Cell::from(Span::styled(
                    format_rate(row.seven_day_rate),
                    rate_style(row.seven_day_rate),
                )),
                Cell::from(Span::styled(
                    format_usd(row.seven_day_profit),
                    rate_style(row.seven_day_profit),
                )),
                trend_cell(row),
            ])
        })
        .collect();

    let mut header = header_row(&screen.table);
    header = header.style(Style::default().add_modifier(Modifier::BOLD));
    let widths = [
        Constraint::Length(SYMBOL_WIDTH),
        Constraint::Length(VALUE_WIDTH),
        Constraint::Length(VALUE_WIDTH),
        Constraint::Length(VALUE_WIDTH),
        Constraint::Length(VALUE_WIDTH),
        Constraint::Min(TREND_POINTS as u16),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(" Lighter Funding History ").borders(Borders::ALL));
    f.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeId;
    use crate::funding::{build_history, join, CanonicalSymbol, JoinPolicy, MarketRef, RateMap};
    use crate::funding::{Direction, RawHistoryPoint};
    use crate::monitor::{BoardView, HistoryView};
    use crate::utils::decimal::RawNumber;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_funding_board() {
        let enabled = [ExchangeId::Binance, ExchangeId::Lighter].into();
        let mut screen = FundingScreen::new(enabled, 10, Some(dec!(1000))).unwrap();
        let maps = HashMap::from([
            (ExchangeId::Binance, RateMap::from([(CanonicalSymbol::parse("BTC"), dec!(0.0001))])),
            (ExchangeId::Lighter, RateMap::from([(CanonicalSymbol::parse("BTC"), dec!(-0.0002))])),
        ]);
        let rows = join(&maps, &screen.enabled, JoinPolicy::default());
        let spreads = crate::funding::top_spreads(&rows, &screen.enabled, 10, screen.principal);
        screen.update(BoardView {
            rows,
            spreads,
            errors: vec![(ExchangeId::Lighter, "HTTP 503".to_string())],
            ..BoardView::default()
        });

        let mut terminal = Terminal::new(TestBackend::new(160, 30)).unwrap();
        terminal.draw(|f| render_funding(f, &screen)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("Funding Rate Monitor"));
        assert!(text.contains("BTC"));
        assert!(text.contains("+0.0100%"));
        assert!(text.contains("-0.0200%"));
        assert!(text.contains("Lighter error: HTTP 503"));
        assert!(text.contains("$0.30/8h"));
    }

    #[test]
    fn test_render_history_board() {
        let mut screen = HistoryScreen::new(10, dec!(1000)).unwrap();
        let market = MarketRef {
            market_id: 1,
            symbol: "ETH".to_string(),
            current_rate: None,
        };
        let points = vec![RawHistoryPoint {
            timestamp: 0,
            rate: Some(RawNumber::from("0.02")),
            value: None,
            direction: Direction::Long,
        }];
        screen.update(HistoryView {
            rows: vec![build_history(&market, &points, dec!(1000))],
            error: Some("Partial data: BTC: HTTP 429".to_string()),
            ..HistoryView::default()
        });

        let mut terminal = Terminal::new(TestBackend::new(160, 20)).unwrap();
        terminal.draw(|f| render_history(f, &screen)).unwrap();
        let text = buffer_text(&terminal);

        assert!(text.contains("ETH"));
        assert!(text.contains("+2.0000%"));
        assert!(text.contains("$0.20"));
        assert!(text.contains("█"));
        assert!(text.contains("Partial data: BTC: HTTP 429"));
    }
}
