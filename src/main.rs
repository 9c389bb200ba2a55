use anyhow::Context;
use api_client::{HttpApi, TradingApi};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{Config, LogLevel, load_config, logging};
use core_types::is_option;
use engine::{EngineError, Runner, SessionReport};
use executor::ReplayApi;
use risk::InstrumentTable;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The main entry point for the futbot trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; gateway credentials may come from the real environment.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env file");
        }
    }

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Backtest(args) => handle_backtest(args, cli.log_level).await,
        Commands::Trade(args) => handle_trade(args, cli.log_level).await,
        Commands::CheckConfig(args) => handle_check_config(args),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A Williams %R trend trader for continuous futures contracts.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Overrides the configured log level (RUST_LOG still wins).
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded bars through the strategy and print the session report.
    Backtest(BacktestArgs),
    /// Trade live through the broker gateway until interrupted.
    Trade(ConfigArgs),
    /// Load and validate a configuration file, then print the instrument table.
    CheckConfig(ConfigArgs),
}

#[derive(Parser)]
struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "futbot.toml")]
    config: PathBuf,
}

#[derive(Parser)]
struct BacktestArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Directory with `<contract>.csv` files and `main_contracts.csv`. Overrides `backtest.data_dir`.
    #[arg(long)]
    data: Option<PathBuf>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Loads the configuration and applies the CLI log-level override.
fn load(args: &ConfigArgs, log_level: Option<LogLevel>) -> anyhow::Result<Config> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    Ok(config)
}

/// Cancels the returned token on Ctrl-C or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("Shutdown signal received, stopping after the current update");
        trigger.cancel();
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Could not install the SIGTERM handler");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Could not listen for Ctrl-C");
            }
            return;
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Could not listen for Ctrl-C");
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for Ctrl-C");
    }
}

async fn handle_backtest(args: BacktestArgs, log_level: Option<LogLevel>) -> anyhow::Result<()> {
    let config = load(&args.config, log_level)?;
    let _guard = logging::init(&config.logging)?;

    let data_dir = args.data.unwrap_or_else(|| config.backtest.data_dir.clone());
    tracing::info!(data_dir = %data_dir.display(), "Starting backtest");
    let replay = Arc::new(
        ReplayApi::load(&data_dir, config.backtest.initial_balance, &config.instruments)
            .with_context(|| format!("Failed to load replay data from {}", data_dir.display()))?,
    );

    let mut runner = Runner::from_config(&config, shutdown_token())?;
    let report = runner.run(replay.clone()).await?;

    let orders = replay.order_log().await;
    let realized: rust_decimal::Decimal = orders.iter().map(|o| o.realized_pnl).sum();
    print_report(&report);
    println!("Orders filled: {}  Realized PnL: {}", orders.len(), realized);
    Ok(())
}

async fn handle_trade(args: ConfigArgs, log_level: Option<LogLevel>) -> anyhow::Result<()> {
    let config = load(&args, log_level)?;
    let _guard = logging::init(&config.logging)?;

    let gateway = config.gateway.clone();
    tracing::info!(url = %gateway.url, symbols = ?config.trading.symbols, "Starting live trading");

    let mut runner = Runner::from_config(&config, shutdown_token())?;
    let report = runner
        .supervise(move || {
            let gateway = gateway.clone();
            async move {
                tracing::info!(url = %gateway.url, "Opening gateway session");
                let api: Arc<dyn TradingApi> = Arc::new(HttpApi::new(&gateway)?);
                Ok::<_, EngineError>(api)
            }
        })
        .await?;

    print_report(&report);
    Ok(())
}

fn handle_check_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Instrument", "Point value", "Min volume"]);
    for spec in &config.instruments {
        table.add_row(vec![
            spec.code.clone(),
            spec.point_value.to_string(),
            spec.min_volume.to_string(),
        ]);
    }
    println!("{table}");

    let sizing = if config.trading.fixed_size > 0 {
        format!("fixed {} lots", config.trading.fixed_size)
    } else {
        format!("risk budget {}", config.sizing.risk_ratio)
    };
    println!("Symbols: {}", config.trading.symbols.join(", "));
    println!("Sizing: {sizing}");

    // Risk-budget sizing needs every traded future in the table.
    if config.trading.fixed_size == 0 {
        let instruments = InstrumentTable::new(config.instruments.iter().cloned());
        for symbol in config.trading.symbols.iter().filter(|s| !is_option(s)) {
            if let Err(e) = instruments.lookup(symbol) {
                println!("Warning: {symbol}: {e}");
            }
        }
    }
    println!("Configuration OK");
    Ok(())
}

fn print_report(report: &SessionReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Symbol",
            "Contract",
            "Side",
            "Trades",
            "Stop-loss",
            "Take-profit",
            "Signal exits",
        ]);
    for instrument in &report.instruments {
        let stats = instrument.stats;
        table.add_row(vec![
            instrument.symbol.clone(),
            instrument.contract.clone().unwrap_or_else(|| "-".to_string()),
            instrument.side.to_string(),
            stats.total_trades.to_string(),
            stats.stop_loss_hits.to_string(),
            stats.take_profit_hits.to_string(),
            stats.signal_exits.to_string(),
        ]);
    }

    println!("\nSession {}", report.end);
    println!("{table}");
    match report.final_balance {
        Some(balance) => println!("Final balance: {balance}"),
        None => println!("Final balance: unavailable"),
    }
    if let Some(profit) = report.profit() {
        println!("Profit: {profit}");
    }
    println!("Elapsed: {:.2}s", report.elapsed.as_secs_f64());
}
