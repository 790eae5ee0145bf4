//! Funding Rate Monitor - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use funding_rate_monitor::config::{spread_principal, Config};
use funding_rate_monitor::exchange::{source_for, HistorySource, LighterClient};
use funding_rate_monitor::funding::{top_spreads, EnabledExchanges};
use funding_rate_monitor::monitor::{Board, HistoryCollector, HistorySettings, SourcePoller};
use funding_rate_monitor::persistence::SnapshotStore;
use funding_rate_monitor::tui::{self, format, FundingScreen, HistoryScreen};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Funding Rate Monitor CLI
#[derive(Parser)]
#[command(name = "funding-rate-monitor")]
#[command(version, about = "Cross-exchange perpetual funding rate dashboard")]
struct Cli {
    /// Principal in USD for profit estimates; spreads show profit only when set
    /// (also overrides history.principal_usd)
    #[arg(long, global = true)]
    capital: Option<Decimal>,

    /// Path to a config file (default: ./config.{toml,yaml,json} if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live funding board across all enabled exchanges (default)
    Dashboard,

    /// Lighter 7-day funding history
    History,

    /// Print a summary of the saved snapshots and exit
    Status {
        /// List every saved row
        #[arg(short, long)]
        verbose: bool,
    },
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Dashboard);

    // The dashboards own stdout, so only `status` logs to the console
    init_logging(matches!(command, Commands::Status { .. }))?;

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    if let Some(capital) = cli.capital {
        anyhow::ensure!(capital >= Decimal::ZERO, "--capital must not be negative");
    }
    let spread_principal = spread_principal(cli.capital);
    let history_principal = config.history.principal(cli.capital);

    let store = SnapshotStore::new(&config.snapshot.dir);

    match command {
        Commands::Dashboard => run_dashboard(&config, store, spread_principal).await,
        Commands::History => run_history(&config, store, history_principal).await,
        Commands::Status { verbose } => {
            show_status(&config, &store, spread_principal, history_principal, verbose)
        }
    }
}

/// Initialize logging to an hourly rolling file, and to stdout when asked.
fn init_logging(to_stdout: bool) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "funding-monitor.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    let filter = EnvFilter::from_default_env()
        .add_directive("funding_rate_monitor=debug".parse()?)
        .add_directive(Level::INFO.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    if to_stdout {
        builder
            .with_writer(std::io::stdout.and(file_writer))
            .with_ansi(true)
            .init();
    } else {
        builder.with_writer(file_writer).with_ansi(false).init();
    }

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config, principal: Option<Decimal>) {
    let enabled: Vec<String> = config
        .enabled_exchanges()
        .iter()
        .map(|ex| ex.to_string())
        .collect();
    info!("📋 Configuration:");
    info!("   Exchanges: {}", enabled.join(", "));
    info!("   Min Sources: {}", config.join.min_sources);
    info!("   Refresh: {}s (overrides: {:?})", config.exchanges.refresh_secs, config.exchanges.refresh_overrides);
    info!("   Principal: {}", format::format_usd(principal));
    info!("   Snapshot Dir: {:?}", config.snapshot.dir);
}

/// Stop background tasks, waiting briefly for each.
async fn shutdown(shutdown_tx: watch::Sender<bool>, handles: Vec<JoinHandle<()>>) {
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            warn!("Background task did not stop in time");
        }
    }
}

async fn run_dashboard(config: &Config, store: SnapshotStore, principal: Option<Decimal>) -> Result<()> {
    info!("🚀 Funding Rate Monitor v{} starting", env!("CARGO_PKG_VERSION"));
    log_config(config, principal);

    let enabled = config.enabled_exchanges();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut board = Board::new(
        enabled.clone(),
        config.join_policy(),
        config.display.top_spreads,
        principal,
    );
    match store.load_funding() {
        Ok(Some(snapshot)) => board = board.with_snapshot(snapshot),
        Ok(None) => info!("No funding snapshot yet"),
        Err(e) => warn!(error = %e, "Ignoring unreadable funding snapshot"),
    }

    let mut handles = Vec::new();
    for exchange in &enabled {
        let source = source_for(*exchange, &config.exchanges)
            .with_context(|| format!("Failed to create {} client", exchange))?;
        let poller = SourcePoller::new(source);
        board.attach(*exchange, poller.subscribe());
        handles.push(poller.spawn(config.exchanges.refresh_interval(*exchange), shutdown_rx.clone()));
    }

    let (view_tx, view_rx) = watch::channel(board.view());
    handles.push(tokio::spawn(board.run(view_tx, Some(store), shutdown_rx.clone())));

    let screen = FundingScreen::new(enabled, config.display.rows_per_page, principal)?;
    let result = tui::run(screen, view_rx).await;

    shutdown(shutdown_tx, handles).await;
    info!("👋 Funding Rate Monitor shutdown complete");
    result
}

async fn run_history(config: &Config, store: SnapshotStore, principal: Decimal) -> Result<()> {
    info!("🚀 Lighter history view starting");
    log_config(config, Some(principal));

    let source: Arc<dyn HistorySource> =
        Arc::new(LighterClient::new().context("Failed to create Lighter client")?);
    let settings = HistorySettings {
        lookback: config.history.lookback(),
        count_back: config.history.count_back,
        fetch_gap: config.history.fetch_gap(),
        principal,
        excluded: config.excluded_symbols(),
    };

    let mut collector = HistoryCollector::new(source, settings, Some(store.clone()));
    match store.load_history() {
        Ok(Some(snapshot)) => collector = collector.with_snapshot(snapshot),
        Ok(None) => info!("No history snapshot yet"),
        Err(e) => warn!(error = %e, "Ignoring unreadable history snapshot"),
    }

    let collector = Arc::new(collector);
    let view_rx = collector.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = Arc::clone(&collector).spawn(config.history.refresh_interval(), shutdown_rx);

    let screen = HistoryScreen::new(config.display.rows_per_page, principal)?;
    let result = tui::run(screen, view_rx).await;

    shutdown(shutdown_tx, vec![handle]).await;
    info!("👋 Lighter history view closed");
    result
}

/// Show a summary of the saved snapshots.
fn show_status(
    config: &Config,
    store: &SnapshotStore,
    spread_principal: Option<Decimal>,
    history_principal: Decimal,
    verbose: bool,
) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              FUNDING MONITOR STATUS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!("\n📂 Snapshot directory: {}", store.dir().display());

    let enabled = config.enabled_exchanges();
    match store.load_funding()? {
        None => {
            println!("\n❌ No funding snapshot found.");
            println!("   Run the dashboard once to collect funding rates.");
        }
        Some(snapshot) => {
            println!("\n📊 Funding Board");
            println!("   ├─ Rows:          {}", snapshot.rows.len());
            println!(
                "   └─ Last Updated:  {}",
                snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
            );

            let spreads = top_spreads(&snapshot.rows, &enabled, config.display.top_spreads, spread_principal);
            if !spreads.is_empty() {
                match spread_principal {
                    Some(p) => println!("\n💰 Top Spreads (principal {})", format::format_usd(Some(p))),
                    None => println!("\n💰 Top Spreads"),
                }
                for (i, entry) in spreads.iter().enumerate() {
                    let estimate = entry
                        .estimated_profit
                        .map(|p| format!("  est. {}/8h", format::format_usd(Some(p))))
                        .unwrap_or_default();
                    println!(
                        "   {:>2}. {:<12} {:>10}  long {} {} / short {} {}{}",
                        i + 1,
                        entry.symbol.as_str(),
                        format::format_rate(Some(entry.diff)),
                        entry.low.exchange,
                        format::format_rate(Some(entry.low.rate)),
                        entry.high.exchange,
                        format::format_rate(Some(entry.high.rate)),
                        estimate,
                    );
                }
            }

            if verbose {
                print_rows(&snapshot.rows, &enabled);
            }
        }
    }

    match store.load_history()? {
        None => println!("\n❌ No Lighter history snapshot found."),
        Some(snapshot) => {
            let rows = config.excluded_symbols().retain(snapshot.rows);
            println!("\n📈 Lighter History");
            println!("   ├─ Markets:       {}", rows.len());
            println!(
                "   └─ Last Updated:  {}",
                snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
            );

            if verbose {
                println!("\n   {:<12} {:>12} {:>12} {:>14}", "SYMBOL", "7D AVG", "7D SUM", "7D PROFIT");
                for row in rows.into_iter().map(|r| r.rederive(history_principal)) {
                    println!(
                        "   {:<12} {:>12} {:>12} {:>14}",
                        row.symbol,
                        format::format_rate(row.average_rate),
                        format::format_rate(row.seven_day_rate),
                        format::format_usd(row.seven_day_profit),
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_rows(rows: &[funding_rate_monitor::funding::TableRow], enabled: &EnabledExchanges) {
    let header: Vec<String> = enabled.iter().map(|ex| format!("{:>10}", ex.short_code())).collect();
    println!("\n   {:<12} {}", "SYMBOL", header.join(" "));
    for row in rows {
        let cells: Vec<String> = enabled
            .iter()
            .map(|ex| format!("{:>10}", format::format_rate(row.rate(*ex))))
            .collect();
        println!("   {:<12} {}", row.symbol.as_str(), cells.join(" "));
    }
}
