//! betting-edge: command-line front end for the edge & risk engine.
//!
//! Loads configuration, initialises structured logging, and either replays
//! a historical dataset (`backtest`) or scores live event inputs against a
//! bankroll (`evaluate`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use betting_edge::backtest::{BacktestReport, Backtester};
use betting_edge::config::AppConfig;
use betting_edge::storage;
use betting_edge::strategy::{EventEvaluation, StrategyOrchestrator};
use betting_edge::types::BankrollState;

#[derive(Parser, Debug)]
#[command(name = "betting-edge", version, about)]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, env = "BETTING_EDGE_CONFIG", default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a strategy over a JSON array of resolved events.
    Backtest {
        #[arg(long)]
        dataset: PathBuf,
        /// Overrides `backtest.initial_bankroll`.
        #[arg(long)]
        bankroll: Option<Decimal>,
        /// Write the full report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score one event (or a JSON array of events) against a bankroll.
    Evaluate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        bankroll: Decimal,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    info!(
        version = cfg.engine.version,
        strategy = %cfg.engine.strategy.name,
        kelly_scale = cfg.engine.sizing.kelly_scale,
        max_stake = format!("{:.1}%", cfg.engine.sizing.max_stake_percent),
        "betting-edge starting up"
    );

    match cli.command {
        Command::Backtest {
            dataset,
            bankroll,
            output,
        } => {
            let records = storage::load_dataset(&dataset).await?;
            let bankroll = bankroll.unwrap_or(cfg.backtest.initial_bankroll);
            let backtester = Backtester::new(&cfg.engine)?;

            // Replays are CPU-bound; keep them off the async workers.
            let report = tokio::task::spawn_blocking(move || backtester.run(&records, bankroll))
                .await
                .context("Backtest task panicked")??;

            print_backtest_summary(&report);
            if let Some(path) = output {
                storage::save_report(&report, &path).await?;
                info!(path = %path.display(), "Backtest report written");
            }
        }
        Command::Evaluate {
            input,
            bankroll,
            output,
        } => {
            let inputs = storage::load_event_inputs(&input).await?;
            let orchestrator = Arc::new(StrategyOrchestrator::new(&cfg.engine)?);
            let snapshot = Arc::new(BankrollState::new(bankroll));

            // Every event is scored against the same snapshot; nothing here
            // mutates the bankroll.
            let handles: Vec<_> = inputs
                .into_iter()
                .map(|event| {
                    let orchestrator = Arc::clone(&orchestrator);
                    let snapshot = Arc::clone(&snapshot);
                    tokio::task::spawn_blocking(move || orchestrator.evaluate(&event, &snapshot))
                })
                .collect();

            let mut evaluations = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await.context("Evaluation task panicked")? {
                    Ok(evaluation) => evaluations.push(evaluation),
                    Err(e) => warn!(error = %e, "Event rejected"),
                }
            }

            print_evaluations(&evaluations);
            if let Some(path) = output {
                storage::save_report(&evaluations, &path).await?;
                info!(path = %path.display(), "Evaluations written");
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

fn print_backtest_summary(report: &BacktestReport) {
    let pct = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"));
    println!("strategy        {}", report.strategy);
    println!("status          {:?}", report.status);
    println!("records         {} ({} replayed)", report.records, report.records_replayed);
    println!(
        "bets            {} (W {} / L {} / V {})",
        report.total_bets, report.wins, report.losses, report.voids
    );
    println!("win rate        {}", pct(report.win_rate.map(|w| w * 100.0)));
    println!("staked          {:.2}", report.total_staked);
    println!("profit          {:.2}", report.total_profit);
    println!("roi             {}", pct(report.roi_pct));
    println!(
        "sharpe          {}",
        report.sharpe_ratio.map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}"))
    );
    println!("max drawdown    {:.2}%", report.max_drawdown_pct);
    println!(
        "profit factor   {}",
        report.profit_factor.map_or_else(|| "n/a".to_string(), |p| format!("{p:.2}"))
    );
    println!(
        "bankroll        {:.2} -> {:.2} (peak {:.2})",
        report.initial_bankroll, report.final_bankroll, report.peak_bankroll
    );
    if let Some(brier) = report.calibration.brier_score {
        println!("brier           {brier:.4} ({:?})", report.calibration.diagnosis);
    }
}

fn print_evaluations(evaluations: &[EventEvaluation]) {
    for evaluation in evaluations {
        if let Some(arb) = evaluation.book.as_ref().and_then(|b| b.arbitrage.as_ref()) {
            println!("{arb}");
        }
        for decision in evaluation.proposed() {
            println!("{decision}");
        }
    }
    let proposed: usize = evaluations.iter().map(|e| e.proposed().count()).sum();
    let staked: Decimal = evaluations
        .iter()
        .flat_map(|e| e.proposed())
        .map(|d| d.stake)
        .sum();
    println!("{proposed} bet(s) proposed, total stake {staked:.2}");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("betting_edge=info"));

    let json_logging = std::env::var("BETTING_EDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
