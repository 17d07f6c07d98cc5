//! Bookmaker price optimisation and cross-book arbitrage.
//!
//! Picks the best price per outcome across every bookmaker quoting an
//! event and flags a risk-free arbitrage when the best prices' implied
//! probabilities sum to less than one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

use crate::types::{Event, OddsQuote};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Best price for one outcome and the bookmaker offering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPrice {
    pub outcome: String,
    pub bookmaker: String,
    pub price: f64,
    pub captured_at: DateTime<Utc>,
    /// Earliest price the same bookmaker quoted for this outcome, when it
    /// differs in time from the current quote.
    pub opening_price: Option<f64>,
}

/// Best prices for an event, with the arbitrage (if any) they form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBook {
    pub event_id: String,
    /// In event outcome order; outcomes without a valid quote are absent.
    pub best_prices: Vec<BestPrice>,
    /// Σ 1 / best price over the quoted outcomes.
    pub implied_sum: f64,
    /// Whether every outcome of the event has a valid price.
    pub complete: bool,
    pub arbitrage: Option<ArbitrageOpportunity>,
}

impl MarketBook {
    pub fn best_price(&self, outcome: &str) -> Option<&BestPrice> {
        self.best_prices.iter().find(|b| b.outcome == outcome)
    }

    /// Bookmaker margin of the best-price book, in percent (negative = arbitrage).
    pub fn overround_pct(&self) -> f64 {
        (self.implied_sum - 1.0) * 100.0
    }
}

/// Risk-free combination of best prices across outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub event_id: String,
    pub legs: Vec<BestPrice>,
    pub implied_sum: f64,
    /// `(1 − implied_sum) × 100`.
    pub margin: f64,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legs: Vec<String> = self
            .legs
            .iter()
            .map(|l| format!("{}@{:.2}({})", l.outcome, l.price, l.bookmaker))
            .collect();
        write!(
            f,
            "ARB {} margin={:.2}% [{}]",
            self.event_id,
            self.margin,
            legs.join(", ")
        )
    }
}

/// One leg of an arbitrage stake plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageStake {
    pub outcome: String,
    pub bookmaker: String,
    pub price: f64,
    pub stake: f64,
    /// Return if this outcome wins (`stake × price`).
    pub payout: f64,
}

/// Stake distribution for an arbitrage with a given budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageStakePlan {
    pub budget: f64,
    pub legs: Vec<ArbitrageStake>,
    pub total_staked: f64,
    /// Part of the budget not needed to lock in the payout.
    pub unallocated: f64,
    /// Identical across outcomes: equal to the budget.
    pub payout: f64,
    /// `payout − total_staked`, i.e. `budget × margin / 100`.
    pub guaranteed_profit: f64,
}

impl ArbitrageStakePlan {
    /// Funds held after settlement whichever outcome wins:
    /// `budget × (1 + margin / 100)`.
    pub fn final_value(&self) -> f64 {
        self.payout + self.unallocated
    }
}

impl ArbitrageOpportunity {
    /// Stake `budget / price` on every leg so each outcome returns the budget.
    pub fn stake_plan(&self, budget: f64) -> ArbitrageStakePlan {
        let legs: Vec<ArbitrageStake> = self
            .legs
            .iter()
            .map(|leg| {
                let stake = budget / leg.price;
                ArbitrageStake {
                    outcome: leg.outcome.clone(),
                    bookmaker: leg.bookmaker.clone(),
                    price: leg.price,
                    stake,
                    payout: stake * leg.price,
                }
            })
            .collect();
        let total_staked: f64 = legs.iter().map(|l| l.stake).sum();
        ArbitrageStakePlan {
            budget,
            total_staked,
            unallocated: budget - total_staked,
            payout: budget,
            guaranteed_profit: budget - total_staked,
            legs,
        }
    }

    pub fn includes(&self, outcome: &str) -> bool {
        self.legs.iter().any(|l| l.outcome == outcome)
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

pub struct BookmakerOptimizer;

impl BookmakerOptimizer {
    /// Build the best-price book for an event.
    ///
    /// Only the latest quote per (outcome, bookmaker) prices the book; ties
    /// between bookmakers go to the first in input order. Returns `None`
    /// when fewer than two outcomes carry a valid price.
    pub fn optimize(event: &Event, quotes: &[OddsQuote]) -> Option<MarketBook> {
        let mut latest: Vec<&OddsQuote> = Vec::new();
        let mut slot: HashMap<(&str, &str), usize> = HashMap::new();
        let mut opening: HashMap<(&str, &str), &OddsQuote> = HashMap::new();

        for quote in quotes {
            if quote.event_id != event.id || !event.has_outcome(&quote.outcome) {
                continue;
            }
            if !quote.is_valid() {
                debug!(
                    event_id = %event.id,
                    outcome = %quote.outcome,
                    bookmaker = %quote.bookmaker,
                    price = quote.price,
                    "Invalid odds quote ignored"
                );
                continue;
            }

            let key = (quote.outcome.as_str(), quote.bookmaker.as_str());
            match slot.get(&key) {
                Some(&idx) => {
                    if quote.captured_at >= latest[idx].captured_at {
                        latest[idx] = quote;
                    }
                }
                None => {
                    slot.insert(key, latest.len());
                    latest.push(quote);
                }
            }
            opening
                .entry(key)
                .and_modify(|first| {
                    if quote.captured_at < first.captured_at {
                        *first = quote;
                    }
                })
                .or_insert(quote);
        }

        let mut best_prices = Vec::new();
        for outcome in &event.outcomes {
            let mut best: Option<&OddsQuote> = None;
            for quote in latest.iter().copied().filter(|q| &q.outcome == outcome) {
                if best.map_or(true, |b| quote.price > b.price) {
                    best = Some(quote);
                }
            }
            if let Some(q) = best {
                let opening_price = opening
                    .get(&(q.outcome.as_str(), q.bookmaker.as_str()))
                    .filter(|first| first.captured_at < q.captured_at)
                    .map(|first| first.price);
                best_prices.push(BestPrice {
                    outcome: q.outcome.clone(),
                    bookmaker: q.bookmaker.clone(),
                    price: q.price,
                    captured_at: q.captured_at,
                    opening_price,
                });
            }
        }

        if best_prices.len() < 2 {
            debug!(
                event_id = %event.id,
                priced = best_prices.len(),
                "Not enough priced outcomes for a book"
            );
            return None;
        }

        let implied_sum: f64 = best_prices.iter().map(|b| 1.0 / b.price).sum();
        let complete = best_prices.len() == event.outcomes.len();

        let arbitrage = (complete && implied_sum < 1.0).then(|| {
            let opp = ArbitrageOpportunity {
                event_id: event.id.clone(),
                legs: best_prices.clone(),
                implied_sum,
                margin: (1.0 - implied_sum) * 100.0,
            };
            info!(
                event_id = %event.id,
                margin = format!("{:.2}%", opp.margin),
                "Arbitrage detected"
            );
            opp
        });

        Some(MarketBook {
            event_id: event.id.clone(),
            best_prices,
            implied_sum,
            complete,
            arbitrage,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
