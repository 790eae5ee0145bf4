//! Terminal dashboard.
//!
//! Two screens share one loop shape: poll the keyboard, pick up the latest
//! published view, redraw at most ~30 times a second.

pub mod app;
pub mod format;
pub mod render;
pub mod table;

pub use app::{Action, FundingScreen, HistoryScreen, TableState};
pub use table::{Column, HistoryColumn, SortDirection, SortState, TableSorter, Viewport};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

use crate::monitor::{BoardView, HistoryView};

const DRAW_EVERY: Duration = Duration::from_millis(33);
const KEY_POLL: Duration = Duration::from_millis(10);
const VIEW_WAIT: Duration = Duration::from_millis(16);

/// Raw mode and the alternate screen, restored on drop.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Read one key press if one is waiting.
fn poll_key() -> Result<Option<event::KeyEvent>> {
    if !event::poll(KEY_POLL)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

/// A screen driven by one published view.
pub trait Screen {
    type View: Clone;

    fn update(&mut self, view: Self::View);
    fn handle_key(&mut self, key: event::KeyEvent) -> Action;
    fn render(&self, f: &mut Frame<'_>);
}

impl Screen for FundingScreen {
    type View = BoardView;

    fn update(&mut self, view: BoardView) {
        FundingScreen::update(self, view);
    }

    fn handle_key(&mut self, key: event::KeyEvent) -> Action {
        self.table.handle_key(key)
    }

    fn render(&self, f: &mut Frame<'_>) {
        render::render_funding(f, self);
    }
}

impl Screen for HistoryScreen {
    type View = HistoryView;

    fn update(&mut self, view: HistoryView) {
        HistoryScreen::update(self, view);
    }

    fn handle_key(&mut self, key: event::KeyEvent) -> Action {
        self.table.handle_key(key)
    }

    fn render(&self, f: &mut Frame<'_>) {
        render::render_history(f, self);
    }
}

/// Take over the terminal and run `screen` until the user quits.
pub async fn run<S: Screen>(mut screen: S, mut rx: watch::Receiver<S::View>) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    screen.update(rx.borrow_and_update().clone());

    let mut last_draw: Option<Instant> = None;
    let mut dirty = true;
    loop {
        if let Some(key) = poll_key()? {
            if screen.handle_key(key) == Action::Quit {
                debug!("Screen closed");
                return Ok(());
            }
            dirty = true;
        }

        if dirty && last_draw.map_or(true, |t| t.elapsed() >= DRAW_EVERY) {
            terminal.draw(|f| screen.render(f))?;
            last_draw = Some(Instant::now());
            dirty = false;
        }

        // `changed` marks the value seen, so read it right away
        if let Ok(Ok(())) = tokio::time::timeout(VIEW_WAIT, rx.changed()).await {
            screen.update(rx.borrow_and_update().clone());
            dirty = true;
        }
    }
}
