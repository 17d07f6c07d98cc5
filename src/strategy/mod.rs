//! Strategy engine: probability aggregation, edge detection, Kelly sizing
//! and bookmaker optimisation.

pub mod arbitrage;
pub mod definition;
pub mod edge;
pub mod kelly;
pub mod probability;
pub mod risk;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::types::{
    BankrollState, BetDecision, BetStatus, EngineError, Event, OddsQuote, ProbabilityEstimate,
};
use arbitrage::{BookmakerOptimizer, MarketBook};
use definition::{Opportunity, StrategyDefinition};
use edge::{EdgeDetector, EdgeInputs};
use kelly::StakeSizer;
use probability::{CalibratedProbability, ProbabilityAggregator};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything known about one event at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    pub event: Event,
    pub quotes: Vec<OddsQuote>,
    pub estimates: Vec<ProbabilityEstimate>,
}

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// Why an outcome did not produce a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No valid (> 1.0) price for the outcome.
    InvalidOdds,
    /// No usable probability estimate for the outcome.
    NoEstimate,
    /// Composite edge ≤ 0.
    NoEdge,
    BelowMinEdge,
    BelowMinConfidence,
    OddsAboveMax,
    /// Kelly, risk adjustments or an empty bankroll sized the bet to zero.
    ZeroStake,
    /// Rejected by the strategy's custom predicate.
    FilteredOut,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::InvalidOdds => "invalid odds",
            SkipReason::NoEstimate => "no probability estimate",
            SkipReason::NoEdge => "no edge",
            SkipReason::BelowMinEdge => "edge below strategy minimum",
            SkipReason::BelowMinConfidence => "confidence below strategy minimum",
            SkipReason::OddsAboveMax => "odds above strategy maximum",
            SkipReason::ZeroStake => "zero stake",
            SkipReason::FilteredOut => "rejected by strategy filter",
        };
        write!(f, "{s}")
    }
}

/// Fate of one outcome: a proposed bet or the reason it was passed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionRecord {
    Proposed(BetDecision),
    Skipped { outcome: String, reason: SkipReason },
}

/// Result of running the pipeline over one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEvaluation {
    pub event_id: String,
    /// `None` when fewer than two outcomes were validly priced.
    pub book: Option<MarketBook>,
    pub probabilities: Vec<CalibratedProbability>,
    pub records: Vec<DecisionRecord>,
}

impl EventEvaluation {
    pub fn proposed(&self) -> impl Iterator<Item = &BetDecision> {
        self.records.iter().filter_map(|r| match r {
            DecisionRecord::Proposed(d) => Some(d),
            DecisionRecord::Skipped { .. } => None,
        })
    }

    pub fn into_decisions(self) -> Vec<BetDecision> {
        self.records
            .into_iter()
            .filter_map(|r| match r {
                DecisionRecord::Proposed(d) => Some(d),
                DecisionRecord::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn skip_reason(&self, outcome: &str) -> Option<SkipReason> {
        self.records.iter().find_map(|r| match r {
            DecisionRecord::Skipped { outcome: o, reason } if o == outcome => Some(*reason),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Pipelines best prices → calibrated probability → edge → stake → strategy
/// thresholds for one event at a time.
///
/// Evaluation only reads the bankroll snapshot it is given, so one
/// orchestrator can be shared across threads.
pub struct StrategyOrchestrator {
    aggregator: ProbabilityAggregator,
    edge_detector: EdgeDetector,
    sizer: StakeSizer,
    strategy: StrategyDefinition,
}

impl StrategyOrchestrator {
    /// Build the pipeline from a validated engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::with_strategy(config, config.strategy.clone())
    }

    /// Same pipeline, different strategy thresholds.
    pub fn with_strategy(
        config: &EngineConfig,
        strategy: StrategyDefinition,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        strategy.validate()?;
        Ok(Self {
            aggregator: ProbabilityAggregator::new(config.aggregator.clone())?,
            edge_detector: EdgeDetector::new(config.edge.clone())?,
            sizer: StakeSizer::new(strategy.sizing(&config.sizing))?,
            strategy,
        })
    }

    pub fn strategy(&self) -> &StrategyDefinition {
        &self.strategy
    }

    /// Run the full pipeline for one event.
    ///
    /// Steps:
    /// 1. Best price per outcome (and any arbitrage) across bookmakers.
    /// 2. Calibrated probability per outcome.
    /// 3. Composite edge per validly priced outcome.
    /// 4. Strategy thresholds (min edge, min confidence, max odds).
    /// 5. Kelly stake against the bankroll snapshot, then the custom filter.
    ///
    /// Missing quotes or estimates skip the affected outcome; only
    /// malformed estimates fail the call.
    pub fn evaluate(
        &self,
        input: &EventInput,
        bankroll: &BankrollState,
    ) -> Result<EventEvaluation, EngineError> {
        let event = &input.event;

        // Step 1 – best prices
        let Some(book) = BookmakerOptimizer::optimize(event, &input.quotes) else {
            debug!(event_id = %event.id, "No usable book, event skipped");
            return Ok(EventEvaluation {
                event_id: event.id.clone(),
                book: None,
                probabilities: Vec::new(),
                records: Vec::new(),
            });
        };

        // Step 2 – calibrated probabilities
        let mut calibrated: HashMap<String, CalibratedProbability> = HashMap::new();
        let mut probabilities = Vec::new();
        for (outcome, result) in self
            .aggregator
            .aggregate_event(&event.outcomes, &input.estimates)
        {
            match result {
                Ok(p) => {
                    probabilities.push(p.clone());
                    calibrated.insert(outcome, p);
                }
                Err(EngineError::InsufficientData(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let mut records = Vec::with_capacity(event.outcomes.len());
        for outcome in &event.outcomes {
            let record = self.evaluate_outcome(event, outcome, &book, calibrated.get(outcome), bankroll);
            if let DecisionRecord::Skipped { reason, .. } = &record {
                debug!(event_id = %event.id, outcome = %outcome, reason = %reason, "Outcome skipped");
            }
            records.push(record);
        }

        let proposed = records
            .iter()
            .filter(|r| matches!(r, DecisionRecord::Proposed(_)))
            .count();
        info!(
            event_id = %event.id,
            outcomes = event.outcomes.len(),
            proposed,
            arbitrage = book.arbitrage.is_some(),
            "Event evaluated"
        );

        Ok(EventEvaluation {
            event_id: event.id.clone(),
            book: Some(book),
            probabilities,
            records,
        })
    }

    fn evaluate_outcome(
        &self,
        event: &Event,
        outcome: &str,
        book: &MarketBook,
        calibrated: Option<&CalibratedProbability>,
        bankroll: &BankrollState,
    ) -> DecisionRecord {
        let skip = |reason| DecisionRecord::Skipped {
            outcome: outcome.to_string(),
            reason,
        };

        let Some(best) = book.best_price(outcome) else {
            return skip(SkipReason::InvalidOdds);
        };
        let Some(calibrated) = calibrated else {
            return skip(SkipReason::NoEstimate);
        };

        // Step 3 – composite edge
        let arbitrage_margin = book
            .arbitrage
            .as_ref()
            .filter(|arb| arb.includes(outcome))
            .map(|arb| arb.margin);
        let inputs = EdgeInputs {
            outcome,
            probability: calibrated.probability,
            best_odds: best.price,
            opening_odds: best.opening_price,
            model_probability: calibrated.model_probability,
            arbitrage_margin,
        };
        let Ok(edge) = self.edge_detector.score(&inputs) else {
            return skip(SkipReason::InvalidOdds);
        };

        // Step 4 – strategy thresholds
        if !edge.is_positive() {
            return skip(SkipReason::NoEdge);
        }
        if edge.composite_edge < self.strategy.min_edge {
            return skip(SkipReason::BelowMinEdge);
        }
        if edge.confidence < self.strategy.min_confidence {
            return skip(SkipReason::BelowMinConfidence);
        }
        if best.price > self.strategy.max_odds {
            return skip(SkipReason::OddsAboveMax);
        }

        // Step 5 – sizing and custom filter
        let stake = self
            .sizer
            .size(&edge, calibrated.probability, best.price, bankroll);
        if !stake.is_bet() {
            return skip(SkipReason::ZeroStake);
        }

        let opportunity = Opportunity {
            event_id: &event.id,
            outcome,
            bookmaker: &best.bookmaker,
            odds: best.price,
            probability: calibrated.probability,
            edge: &edge,
            stake_percent: stake.stake_percent,
        };
        if !self.strategy.accepts(&opportunity) {
            return skip(SkipReason::FilteredOut);
        }

        let decision = BetDecision {
            id: Uuid::new_v4(),
            event_id: event.id.clone(),
            outcome: outcome.to_string(),
            bookmaker: best.bookmaker.clone(),
            odds: best.price,
            probability: calibrated.probability,
            stake: stake.stake,
            stake_percent: stake.stake_percent,
            confidence: edge.confidence,
            edge,
            status: BetStatus::Proposed,
            warnings: calibrated.warning.iter().cloned().collect(),
            realized_odds: None,
            pnl: None,
        };

        info!(
            event_id = %decision.event_id,
            outcome = %decision.outcome,
            bookmaker = %decision.bookmaker,
            odds = decision.odds,
            edge = format!("{:.2}%", decision.edge.composite_edge),
            confidence = decision.confidence,
            stake = %decision.stake,
            "Bet proposed"
        );

        DecisionRecord::Proposed(decision)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
