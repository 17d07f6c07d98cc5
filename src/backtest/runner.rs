//! Historical backtesting engine.
//!
//! Replays resolved events through the live strategy pipeline to evaluate
//! performance metrics: win rate, ROI, Sharpe ratio, max drawdown,
//! profit factor and probability calibration.
//!
//! A run depends only on the dataset and the configuration: records are
//! replayed in start-time order and the report carries no ids or clock
//! readings, so two runs over the same input serialize identically.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::calibration::{CalibrationPoint, CalibrationReport, Calibrator};
use crate::config::EngineConfig;
use crate::strategy::definition::StrategyDefinition;
use crate::strategy::{EventInput, StrategyOrchestrator};
use crate::types::{BankrollState, BetStatus, EngineError, Settlement};

// ---------------------------------------------------------------------------
// Historical data
// ---------------------------------------------------------------------------

/// One resolved event: what was known at decision time plus the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(flatten)]
    pub input: EventInput,
    /// Winning outcome; `None` when the event was voided.
    pub winner: Option<String>,
}

impl HistoricalRecord {
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.input.event.starts_at
    }

    fn settlement_for(&self, outcome: &str, odds: f64) -> Settlement {
        match &self.winner {
            None => Settlement::void(odds),
            Some(w) if w == outcome => Settlement::won(odds),
            Some(_) => Settlement::lost(odds),
        }
    }
}

// ---------------------------------------------------------------------------
// Backtest results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The dataset was empty.
    NoData,
    /// Records were replayed but the strategy never bet.
    NoBets,
    Completed,
}

/// Complete backtest performance report. Ratios are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub status: ReportStatus,
    pub strategy: String,
    pub config_version: u32,
    pub records: usize,
    pub records_replayed: usize,
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub voids: usize,
    pub win_rate: Option<f64>,
    pub total_staked: Decimal,
    pub total_profit: Decimal,
    /// total_profit / total_staked, in percent.
    pub roi_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown_pct: f64,
    /// Sum of winning P&L over the absolute sum of losing P&L.
    pub profit_factor: Option<f64>,
    pub initial_bankroll: Decimal,
    pub final_bankroll: Decimal,
    pub peak_bankroll: Decimal,
    /// Bankroll after every settled bet, starting with the initial balance.
    pub equity_curve: Vec<Decimal>,
    pub trade_log: Vec<BacktestTrade>,
    pub calibration: CalibrationReport,
}

/// Individual settled bet in the backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub event_id: String,
    pub starts_at: DateTime<Utc>,
    pub outcome: String,
    pub bookmaker: String,
    pub odds: f64,
    pub probability: f64,
    pub composite_edge: f64,
    pub confidence: u8,
    pub stake: Decimal,
    pub result: BetStatus,
    pub pnl: Decimal,
    pub bankroll_after: Decimal,
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    orchestrator: StrategyOrchestrator,
    config_version: u32,
}

impl Backtester {
    /// Backtest the strategy embedded in `config`.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::with_strategy(config, config.strategy.clone())
    }

    /// Backtest a different strategy through the same pipeline.
    pub fn with_strategy(
        config: &EngineConfig,
        strategy: StrategyDefinition,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            orchestrator: StrategyOrchestrator::with_strategy(config, strategy)?,
            config_version: config.version,
        })
    }

    /// Run a backtest over a set of resolved events.
    ///
    /// Records are replayed in `starts_at` order; ties keep dataset order.
    /// Bets on one event are sized against the bankroll as it stood before
    /// the event and settled one after another. The replay stops once the
    /// bankroll is exhausted.
    pub fn run(
        &self,
        records: &[HistoricalRecord],
        initial_bankroll: Decimal,
    ) -> Result<BacktestReport, EngineError> {
        let mut ordered: Vec<&HistoricalRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.starts_at());

        let mut state = BankrollState::new(initial_bankroll);
        let mut calibrator = Calibrator::new();
        let mut trade_log: Vec<BacktestTrade> = Vec::new();
        let mut replayed = 0usize;

        for record in ordered {
            if state.bankroll <= Decimal::ZERO {
                warn!(bankroll = %state.bankroll, "Bankroll exhausted, stopping replay");
                break;
            }
            if let Some(winner) = &record.winner {
                if !record.input.event.has_outcome(winner) {
                    return Err(EngineError::InvalidRecord(format!(
                        "winner {winner} is not an outcome of event {}",
                        record.input.event.id
                    )));
                }
            }
            replayed += 1;

            let evaluation = self.orchestrator.evaluate(&record.input, &state)?;

            if let Some(winner) = &record.winner {
                calibrator.add_points(evaluation.probabilities.iter().map(|p| CalibrationPoint {
                    event_id: record.input.event.id.clone(),
                    outcome: p.outcome.clone(),
                    probability: p.probability,
                    hit: &p.outcome == winner,
                }));
            }

            for mut decision in evaluation.into_decisions() {
                decision.place()?;
                let settlement = record.settlement_for(&decision.outcome, decision.odds);
                let receipt = state.settle(&decision, &settlement)?;
                state = receipt.bankroll;

                debug!(
                    event_id = %decision.event_id,
                    outcome = %decision.outcome,
                    result = %receipt.decision.status,
                    pnl = %receipt.pnl,
                    bankroll = %state.bankroll,
                    "Backtest bet settled"
                );

                trade_log.push(BacktestTrade {
                    event_id: decision.event_id,
                    starts_at: record.starts_at(),
                    outcome: decision.outcome,
                    bookmaker: decision.bookmaker,
                    odds: decision.odds,
                    probability: decision.probability,
                    composite_edge: decision.edge.composite_edge,
                    confidence: decision.confidence,
                    stake: decision.stake,
                    result: receipt.decision.status,
                    pnl: receipt.pnl,
                    bankroll_after: state.bankroll,
                });
            }
        }

        let report = self.build_report(records.len(), replayed, state, trade_log, &calibrator);

        info!(
            strategy = %report.strategy,
            status = ?report.status,
            bets = report.total_bets,
            profit = %report.total_profit,
            roi = report.roi_pct.map(|r| format!("{r:.2}%")).unwrap_or_else(|| "n/a".into()),
            max_drawdown = format!("{:.1}%", report.max_drawdown_pct),
            "Backtest complete"
        );

        Ok(report)
    }

    fn build_report(
        &self,
        records: usize,
        replayed: usize,
        state: BankrollState,
        trade_log: Vec<BacktestTrade>,
        calibrator: &Calibrator,
    ) -> BacktestReport {
        let initial_bankroll = state.equity_curve.first().copied().unwrap_or(state.bankroll);
        let total_bets = trade_log.len();
        let count = |status: BetStatus| trade_log.iter().filter(|t| t.result == status).count();
        let wins = count(BetStatus::Won);
        let losses = count(BetStatus::Lost);
        let voids = count(BetStatus::Void);

        let total_staked: Decimal = trade_log.iter().map(|t| t.stake).sum();
        let total_profit: Decimal = trade_log.iter().map(|t| t.pnl).sum();
        let gross_wins: Decimal = trade_log
            .iter()
            .filter(|t| t.pnl > Decimal::ZERO)
            .map(|t| t.pnl)
            .sum();
        let gross_losses: Decimal = trade_log
            .iter()
            .filter(|t| t.pnl < Decimal::ZERO)
            .map(|t| t.pnl.abs())
            .sum();

        let decided = wins + losses;
        let win_rate = (decided > 0).then(|| wins as f64 / decided as f64);
        let roi_pct = ratio(total_profit * dec!(100), total_staked);
        let profit_factor = ratio(gross_wins, gross_losses);

        let returns: Vec<f64> = trade_log
            .iter()
            .filter_map(|t| ratio(t.pnl, t.stake))
            .collect();
        let span_days = match (trade_log.first(), trade_log.last()) {
            (Some(first), Some(last)) => (last.starts_at - first.starts_at).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        };

        let status = if records == 0 {
            ReportStatus::NoData
        } else if total_bets == 0 {
            ReportStatus::NoBets
        } else {
            ReportStatus::Completed
        };

        BacktestReport {
            status,
            strategy: self.orchestrator.strategy().name.clone(),
            config_version: self.config_version,
            records,
            records_replayed: replayed,
            total_bets,
            wins,
            losses,
            voids,
            win_rate,
            total_staked,
            total_profit,
            roi_pct,
            sharpe_ratio: compute_sharpe(&returns, span_days),
            max_drawdown_pct: max_drawdown_pct(&state.equity_curve),
            profit_factor,
            initial_bankroll,
            final_bankroll: state.bankroll,
            peak_bankroll: state.peak_bankroll,
            equity_curve: state.equity_curve,
            trade_log,
            calibration: calibrator.report(),
        }
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Option<f64> {
    if denominator.is_zero() {
        return None;
    }
    (numerator / denominator).to_f64()
}

/// Annualized Sharpe ratio of per-bet returns.
///
/// Annualized by `sqrt(bets per year)`, where the year is measured over
/// the start times of the bets themselves (at least one day). Undefined
/// for fewer than two bets or zero variance.
pub fn compute_sharpe(returns: &[f64], span_days: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return None;
    }

    let years = span_days.max(1.0) / 365.25;
    let bets_per_year = n / years;
    Some((mean / std_dev) * bets_per_year.sqrt())
}

/// Largest peak-to-trough decline of an equity curve, in percent.
pub fn max_drawdown_pct(curve: &[Decimal]) -> f64 {
    let mut peak = Decimal::ZERO;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        if value > peak {
            peak = value;
        }
        if peak > Decimal::ZERO {
            let dd = ((peak - value) / peak).to_f64().unwrap_or(0.0);
            max_dd = max_dd.max(dd);
        }
    }
    (max_dd * 100.0).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
