//! Composite edge detection.
//!
//! Scores an outcome from four signals (statistical value, arbitrage,
//! line movement, external model) and maps the composite to a discrete
//! 1–10 confidence.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{is_valid_price, EdgeScore, EngineError};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Weights of each signal in the composite edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub base_weight: f64,
    pub arbitrage_weight: f64,
    pub movement_weight: f64,
    pub model_weight: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            base_weight: 0.60,
            arbitrage_weight: 0.20,
            movement_weight: 0.10,
            model_weight: 0.10,
        }
    }
}

impl EdgeConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let weights = [
            ("base_weight", self.base_weight),
            ("arbitrage_weight", self.arbitrage_weight),
            ("movement_weight", self.movement_weight),
            ("model_weight", self.model_weight),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{name} must be finite and non-negative, got {w}"
                )));
            }
        }
        if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(EngineError::Configuration(
                "edge weights must not all be zero".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Edge detection
// ---------------------------------------------------------------------------

/// Everything the detector needs to score one outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeInputs<'a> {
    pub outcome: &'a str,
    /// Calibrated probability.
    pub probability: f64,
    /// Best available decimal odds.
    pub best_odds: f64,
    /// Earliest known price for the same outcome, if any.
    pub opening_odds: Option<f64>,
    /// External model probability, if one was supplied.
    pub model_probability: Option<f64>,
    /// Margin (%) of an arbitrage this outcome takes part in.
    pub arbitrage_margin: Option<f64>,
}

pub struct EdgeDetector {
    config: EdgeConfig,
}

impl EdgeDetector {
    pub fn new(config: EdgeConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the edge configuration.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Score a single outcome.
    ///
    /// Fails with `InvalidOdds` when the best price is not above 1.0;
    /// a negative composite edge is a valid result.
    pub fn score(&self, inputs: &EdgeInputs<'_>) -> Result<EdgeScore, EngineError> {
        if !is_valid_price(inputs.best_odds) {
            warn!(
                outcome = inputs.outcome,
                price = inputs.best_odds,
                "Invalid odds, outcome skipped"
            );
            return Err(EngineError::InvalidOdds {
                outcome: inputs.outcome.to_string(),
                price: inputs.best_odds,
            });
        }

        let base_edge = expected_value_pct(inputs.probability, inputs.best_odds);
        let arbitrage_edge = inputs.arbitrage_margin.unwrap_or(0.0);
        let movement_edge = inputs
            .opening_odds
            .filter(|o| is_valid_price(*o))
            .map(|opening| (inputs.best_odds - opening) / opening * 100.0)
            .unwrap_or(0.0);
        let model_edge = inputs
            .model_probability
            .map(|p| expected_value_pct(p, inputs.best_odds))
            .unwrap_or(0.0);

        let c = &self.config;
        let composite_edge = c.base_weight * base_edge
            + c.arbitrage_weight * arbitrage_edge
            + c.movement_weight * movement_edge
            + c.model_weight * model_edge;

        let positive_signals = [base_edge, arbitrage_edge, movement_edge, model_edge]
            .iter()
            .filter(|e| **e > 0.0)
            .count();
        let confidence = confidence_score(composite_edge, positive_signals);

        let score = EdgeScore {
            base_edge,
            arbitrage_edge,
            movement_edge,
            model_edge,
            composite_edge,
            confidence,
        };

        debug!(
            outcome = inputs.outcome,
            odds = inputs.best_odds,
            probability = format!("{:.1}%", inputs.probability * 100.0),
            composite = format!("{:.2}%", composite_edge),
            confidence,
            "Edge scored"
        );

        Ok(score)
    }
}

/// Expected value per unit stake, as a percentage: `(p × odds − 1) × 100`.
pub fn expected_value_pct(probability: f64, odds: f64) -> f64 {
    (probability * odds - 1.0) * 100.0
}

/// Step function of the composite edge plus one point per additional
/// positive signal. Non-decreasing in both arguments, within 1..=10.
pub fn confidence_score(composite_edge: f64, positive_signals: usize) -> u8 {
    let tier: u8 = if composite_edge <= 0.0 {
        1
    } else if composite_edge < 2.0 {
        3
    } else if composite_edge < 5.0 {
        5
    } else if composite_edge < 10.0 {
        6
    } else {
        7
    };
    let bonus = positive_signals.saturating_sub(1).min(3) as u8;
    (tier + bonus).clamp(1, 10)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
