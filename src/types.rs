//! Shared types for the betting edge engine.
//!
//! These types form the data model used across all modules.
//! Strategy, backtest and engine modules depend on them without
//! depending on each other.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Event & odds
// ---------------------------------------------------------------------------

/// A real-world fixture with two or more mutually exclusive outcomes.
///
/// Deserialization goes through [`Event::new`], so a loaded event has the
/// same guarantees as one built in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    pub id: String,
    /// Outcome ids, e.g. `["home", "draw", "away"]` or `["over", "under"]`.
    pub outcomes: Vec<String>,
    pub starts_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    outcomes: Vec<String>,
    starts_at: DateTime<Utc>,
}

impl TryFrom<RawEvent> for Event {
    type Error = EngineError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Event::new(raw.id, raw.outcomes, raw.starts_at)
    }
}

impl Event {
    /// Build an event, rejecting fewer than two distinct outcomes.
    pub fn new(
        id: impl Into<String>,
        outcomes: Vec<String>,
        starts_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        let mut distinct = outcomes.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 2 || distinct.len() != outcomes.len() {
            return Err(EngineError::InsufficientData(format!(
                "event {id} needs at least two distinct outcomes, got {outcomes:?}"
            )));
        }
        Ok(Self {
            id,
            outcomes,
            starts_at,
        })
    }

    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] @ {}",
            self.id,
            self.outcomes.join("/"),
            self.starts_at.format("%Y-%m-%d %H:%M"),
        )
    }
}

/// One bookmaker's decimal price for one outcome at one point in time.
///
/// Quotes are append-only: a later quote for the same
/// (event, outcome, bookmaker) supersedes the earlier one for pricing,
/// while the earlier one remains part of the movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub event_id: String,
    pub outcome: String,
    pub bookmaker: String,
    /// Decimal odds (stake included in the return), must be > 1.0.
    pub price: f64,
    pub captured_at: DateTime<Utc>,
}

impl OddsQuote {
    /// Whether the price is usable (finite and strictly above evens-minus-stake).
    pub fn is_valid(&self) -> bool {
        is_valid_price(self.price)
    }

    /// Raw implied probability `1 / price` (includes the bookmaker margin).
    pub fn implied_probability(&self) -> f64 {
        1.0 / self.price
    }
}

impl fmt::Display for OddsQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} @ {:.2} ({})",
            self.event_id, self.outcome, self.price, self.bookmaker
        )
    }
}

/// Decimal odds are only meaningful when finite and above 1.0.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 1.0
}

// ---------------------------------------------------------------------------
// Probability estimates
// ---------------------------------------------------------------------------

/// Where a probability estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilitySource {
    /// Statistical base-rate model.
    Statistical,
    /// Implied by bookmaker prices (carries the overround until de-vigged).
    Market,
    /// External ML / AI model.
    Model,
}

impl fmt::Display for ProbabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbabilitySource::Statistical => write!(f, "statistical"),
            ProbabilitySource::Market => write!(f, "market"),
            ProbabilitySource::Model => write!(f, "model"),
        }
    }
}

/// A probability for one outcome from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEstimate {
    pub outcome: String,
    pub probability: f64,
    pub source: ProbabilitySource,
    /// Source-specific confidence weight. `None` uses the configured
    /// default weight for the source.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl ProbabilityEstimate {
    pub fn new(outcome: impl Into<String>, probability: f64, source: ProbabilitySource) -> Self {
        Self {
            outcome: outcome.into(),
            probability,
            source,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

impl fmt::Display for ProbabilityEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} P={:.1}% ({}",
            self.outcome,
            self.probability * 100.0,
            self.source
        )?;
        if let Some(w) = self.weight {
            write!(f, " w={w:.2}")?;
        }
        write!(f, ")")
    }
}

/// Non-fatal signal that a calibrated probability had to be clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationWarning {
    pub outcome: String,
    pub raw_probability: f64,
    pub clamped_probability: f64,
}

impl fmt::Display for CalibrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probability for {} clamped from {:.4} to {:.4}",
            self.outcome, self.raw_probability, self.clamped_probability
        )
    }
}

// ---------------------------------------------------------------------------
// Edge score
// ---------------------------------------------------------------------------

/// Composite edge for one (event, outcome). All edges are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeScore {
    pub base_edge: f64,
    pub arbitrage_edge: f64,
    pub movement_edge: f64,
    pub model_edge: f64,
    pub composite_edge: f64,
    /// 1–10.
    pub confidence: u8,
}

impl EdgeScore {
    /// Whether the composite edge signals a bet at all.
    pub fn is_positive(&self) -> bool {
        self.composite_edge > 0.0
    }
}

impl fmt::Display for EdgeScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edge={:.2}% (base={:.2} arb={:.2} move={:.2} model={:.2}) conf={}/10",
            self.composite_edge,
            self.base_edge,
            self.arbitrage_edge,
            self.movement_edge,
            self.model_edge,
            self.confidence,
        )
    }
}

// ---------------------------------------------------------------------------
// Bankroll
// ---------------------------------------------------------------------------

/// Bankroll snapshot. Sizing only ever reads a snapshot; settlement
/// returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollState {
    pub bankroll: Decimal,
    pub peak_bankroll: Decimal,
    /// Positive = consecutive wins, negative = consecutive losses.
    pub streak: i32,
    /// Bankroll after every settlement, starting with the opening balance.
    pub equity_curve: Vec<Decimal>,
}

impl fmt::Display for BankrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bankroll={:.2} peak={:.2} drawdown={:.1}% streak={:+}",
            self.bankroll,
            self.peak_bankroll,
            self.drawdown() * 100.0,
            self.streak,
        )
    }
}

impl BankrollState {
    /// Fresh bankroll at its own peak.
    pub fn new(initial_bankroll: Decimal) -> Self {
        Self {
            bankroll: initial_bankroll,
            peak_bankroll: initial_bankroll,
            streak: 0,
            equity_curve: vec![initial_bankroll],
        }
    }

    /// Snapshot supplied by a caller that tracks its own peak and streak.
    pub fn from_parts(bankroll: Decimal, peak_bankroll: Decimal, streak: i32) -> Self {
        Self {
            bankroll,
            peak_bankroll: peak_bankroll.max(bankroll),
            streak,
            equity_curve: vec![bankroll],
        }
    }

    /// Current drawdown from peak as a fraction (0.0 = at peak).
    pub fn drawdown(&self) -> f64 {
        if self.peak_bankroll <= Decimal::ZERO {
            return 0.0;
        }
        let dd = Decimal::ONE - self.bankroll / self.peak_bankroll;
        dd.to_f64().unwrap_or(0.0).clamp(0.0, 1.0)
    }

    pub fn winning_streak(&self) -> u32 {
        self.streak.max(0) as u32
    }

    pub fn losing_streak(&self) -> u32 {
        self.streak.min(0).unsigned_abs()
    }

    /// Apply a settlement and return the new snapshot together with the
    /// terminal decision. `self` is left untouched.
    pub fn settle(
        &self,
        decision: &BetDecision,
        settlement: &Settlement,
    ) -> Result<SettlementReceipt, EngineError> {
        if decision.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                id: decision.id,
                from: decision.status,
                to: settlement.outcome.status(),
            });
        }

        let pnl = match settlement.outcome {
            SettlementOutcome::Won => {
                if !is_valid_price(settlement.realized_odds) {
                    return Err(EngineError::InvalidOdds {
                        outcome: decision.outcome.clone(),
                        price: settlement.realized_odds,
                    });
                }
                let net = Decimal::from_f64(settlement.realized_odds - 1.0).ok_or_else(|| {
                    EngineError::InvalidOdds {
                        outcome: decision.outcome.clone(),
                        price: settlement.realized_odds,
                    }
                })?;
                (decision.stake * net).round_dp(2)
            }
            SettlementOutcome::Lost => -decision.stake,
            SettlementOutcome::Void => Decimal::ZERO,
        };

        let mut next = self.clone();
        next.bankroll += pnl;
        next.streak = match settlement.outcome {
            SettlementOutcome::Won if self.streak > 0 => self.streak + 1,
            SettlementOutcome::Won => 1,
            SettlementOutcome::Lost if self.streak < 0 => self.streak - 1,
            SettlementOutcome::Lost => -1,
            SettlementOutcome::Void => self.streak,
        };
        if next.bankroll > next.peak_bankroll {
            next.peak_bankroll = next.bankroll;
        }
        next.equity_curve.push(next.bankroll);

        let mut settled = decision.clone();
        settled.status = settlement.outcome.status();
        settled.realized_odds = Some(settlement.realized_odds);
        settled.pnl = Some(pnl);

        Ok(SettlementReceipt {
            bankroll: next,
            decision: settled,
            pnl,
        })
    }
}

// ---------------------------------------------------------------------------
// Bet decisions
// ---------------------------------------------------------------------------

/// Lifecycle of a bet decision. `Won`, `Lost` and `Void` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Proposed,
    Placed,
    Won,
    Lost,
    Void,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BetStatus::Won | BetStatus::Lost | BetStatus::Void)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Proposed => write!(f, "PROPOSED"),
            BetStatus::Placed => write!(f, "PLACED"),
            BetStatus::Won => write!(f, "WON"),
            BetStatus::Lost => write!(f, "LOST"),
            BetStatus::Void => write!(f, "VOID"),
        }
    }
}

/// A sized, risk-managed recommendation for one (event, outcome).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetDecision {
    pub id: Uuid,
    pub event_id: String,
    pub outcome: String,
    /// Bookmaker offering the best price.
    pub bookmaker: String,
    /// Best available decimal odds at decision time.
    pub odds: f64,
    /// Calibrated probability the stake was sized on.
    pub probability: f64,
    /// Recommended stake in currency.
    pub stake: Decimal,
    /// Recommended stake as a percentage of bankroll.
    pub stake_percent: f64,
    pub edge: EdgeScore,
    pub confidence: u8,
    pub status: BetStatus,
    #[serde(default)]
    pub warnings: Vec<CalibrationWarning>,
    /// Filled in at settlement.
    #[serde(default)]
    pub realized_odds: Option<f64>,
    #[serde(default)]
    pub pnl: Option<Decimal>,
}

impl fmt::Display for BetDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} @ {:.2} ({}) | p={:.1}% {} | stake={:.2} ({:.2}%)",
            self.status,
            self.event_id,
            self.outcome,
            self.odds,
            self.bookmaker,
            self.probability * 100.0,
            self.edge,
            self.stake,
            self.stake_percent,
        )
    }
}

impl BetDecision {
    /// Expected profit of the recommended stake: `stake × (p × odds − 1)`.
    pub fn expected_value(&self) -> f64 {
        self.stake.to_f64().unwrap_or(0.0) * (self.probability * self.odds - 1.0)
    }

    /// Mark a proposed decision as placed with the bookmaker.
    pub fn place(&mut self) -> Result<(), EngineError> {
        if self.status != BetStatus::Proposed {
            return Err(EngineError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: BetStatus::Placed,
            });
        }
        self.status = BetStatus::Placed;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    Won,
    Lost,
    Void,
}

impl SettlementOutcome {
    pub fn status(&self) -> BetStatus {
        match self {
            SettlementOutcome::Won => BetStatus::Won,
            SettlementOutcome::Lost => BetStatus::Lost,
            SettlementOutcome::Void => BetStatus::Void,
        }
    }
}

/// Result reported by the caller for a placed bet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub outcome: SettlementOutcome,
    /// Odds the bet was actually matched at.
    pub realized_odds: f64,
}

impl Settlement {
    pub fn won(realized_odds: f64) -> Self {
        Self {
            outcome: SettlementOutcome::Won,
            realized_odds,
        }
    }

    pub fn lost(realized_odds: f64) -> Self {
        Self {
            outcome: SettlementOutcome::Lost,
            realized_odds,
        }
    }

    pub fn void(realized_odds: f64) -> Self {
        Self {
            outcome: SettlementOutcome::Void,
            realized_odds,
        }
    }
}

/// New bankroll snapshot and terminal decision produced by a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub bankroll: BankrollState,
    pub decision: BetDecision,
    pub pnl: Decimal,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid odds for {outcome}: {price}")]
    InvalidOdds { outcome: String, price: f64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid estimate: {0}")]
    InvalidEstimate(String),

    #[error("Invalid historical record: {0}")]
    InvalidRecord(String),

    #[error("Invalid transition for bet {id}: {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: BetStatus,
        to: BetStatus,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
