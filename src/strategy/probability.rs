//! Probability aggregation.
//!
//! Reduces statistical, market-implied and model estimates for an outcome
//! to a single calibrated probability. Market-implied estimates are
//! de-vigged against the event's overround before weighting.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{CalibrationWarning, EngineError, ProbabilityEstimate, ProbabilitySource};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Weight used for statistical estimates that carry no explicit weight.
    pub statistical_weight: f64,
    /// Weight used for market-implied estimates that carry no explicit weight.
    pub market_weight: f64,
    /// Weight used for model estimates that carry no explicit weight.
    pub model_weight: f64,
    /// Calibrated probabilities are clamped into `[min_probability, max_probability]`.
    pub min_probability: f64,
    pub max_probability: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            statistical_weight: 1.0,
            market_weight: 1.0,
            model_weight: 1.0,
            min_probability: 0.001,
            max_probability: 0.999,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, w) in [
            ("statistical_weight", self.statistical_weight),
            ("market_weight", self.market_weight),
            ("model_weight", self.model_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{name} must be finite and non-negative, got {w}"
                )));
            }
        }
        if !(self.min_probability > 0.0
            && self.min_probability < self.max_probability
            && self.max_probability < 1.0)
        {
            return Err(EngineError::Configuration(format!(
                "probability bounds must satisfy 0 < min < max < 1, got [{}, {}]",
                self.min_probability, self.max_probability
            )));
        }
        Ok(())
    }

    fn default_weight(&self, source: ProbabilitySource) -> f64 {
        match source {
            ProbabilitySource::Statistical => self.statistical_weight,
            ProbabilitySource::Market => self.market_weight,
            ProbabilitySource::Model => self.model_weight,
        }
    }
}

// ---------------------------------------------------------------------------
// De-vig
// ---------------------------------------------------------------------------

/// Normalise implied probabilities so they sum to 1.
///
/// Returns the input unchanged when the sum is not positive.
pub fn devig(implied: &[f64]) -> Vec<f64> {
    let total: f64 = implied.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return implied.to_vec();
    }
    implied.iter().map(|p| p / total).collect()
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Calibrated probability for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedProbability {
    pub outcome: String,
    pub probability: f64,
    /// Weighted mean of model-sourced estimates alone, if any were supplied.
    pub model_probability: Option<f64>,
    /// Number of estimates that contributed.
    pub sources: usize,
    pub warning: Option<CalibrationWarning>,
}

pub struct ProbabilityAggregator {
    config: AggregatorConfig,
}

impl ProbabilityAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregate the estimates for a single outcome.
    ///
    /// `market_overround` is the sum of market-implied probabilities across
    /// all outcomes of the event; market estimates are divided by it.
    pub fn aggregate(
        &self,
        outcome: &str,
        estimates: &[ProbabilityEstimate],
        market_overround: Option<f64>,
    ) -> Result<CalibratedProbability, EngineError> {
        let relevant: Vec<&ProbabilityEstimate> =
            estimates.iter().filter(|e| e.outcome == outcome).collect();
        if relevant.is_empty() {
            return Err(EngineError::InsufficientData(format!(
                "no probability estimates for outcome {outcome}"
            )));
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut model_sum = 0.0;
        let mut model_weight = 0.0;

        for est in &relevant {
            validate_estimate(est)?;
            let weight = est
                .weight
                .unwrap_or_else(|| self.config.default_weight(est.source));

            let probability = match (est.source, market_overround) {
                (ProbabilitySource::Market, Some(total)) if total > 0.0 && total.is_finite() => {
                    est.probability / total
                }
                _ => est.probability,
            };

            weighted_sum += weight * probability;
            weight_total += weight;
            if est.source == ProbabilitySource::Model {
                model_sum += weight * probability;
                model_weight += weight;
            }
        }

        if weight_total <= 0.0 {
            return Err(EngineError::InsufficientData(format!(
                "estimates for outcome {outcome} carry zero total weight"
            )));
        }

        let raw = weighted_sum / weight_total;
        let (probability, warning) = self.clamp(outcome, raw);
        let model_probability = (model_weight > 0.0).then(|| {
            let (p, _) = self.clamp(outcome, model_sum / model_weight);
            p
        });

        debug!(
            outcome,
            sources = relevant.len(),
            probability = format!("{:.2}%", probability * 100.0),
            "Probability aggregated"
        );

        Ok(CalibratedProbability {
            outcome: outcome.to_string(),
            probability,
            model_probability,
            sources: relevant.len(),
            warning,
        })
    }

    /// Aggregate every outcome of an event in one pass.
    ///
    /// The overround is computed from the market estimates of all listed
    /// outcomes and only applied when each of them has one. Outcomes
    /// without estimates come back as
    /// `InsufficientData` so the caller can skip just that outcome.
    pub fn aggregate_event(
        &self,
        outcomes: &[String],
        estimates: &[ProbabilityEstimate],
    ) -> Vec<(String, Result<CalibratedProbability, EngineError>)> {
        let overround = market_overround(outcomes, estimates);
        outcomes
            .iter()
            .map(|o| (o.clone(), self.aggregate(o, estimates, overround)))
            .collect()
    }

    fn clamp(&self, outcome: &str, raw: f64) -> (f64, Option<CalibrationWarning>) {
        let lo = self.config.min_probability;
        let hi = self.config.max_probability;
        if raw > 0.0 && raw < 1.0 {
            return (raw, None);
        }
        let clamped = raw.clamp(lo, hi);
        warn!(
            outcome,
            raw,
            clamped,
            "Calibrated probability outside (0,1), clamped"
        );
        (
            clamped,
            Some(CalibrationWarning {
                outcome: outcome.to_string(),
                raw_probability: raw,
                clamped_probability: clamped,
            }),
        )
    }
}

/// Sum of the mean market-implied probability per outcome.
///
/// `None` when no market estimates were supplied, or when some outcome has
/// none: a partial book has no meaningful overround, so its market
/// estimates are used as given.
fn market_overround(outcomes: &[String], estimates: &[ProbabilityEstimate]) -> Option<f64> {
    let mut total = 0.0;
    let mut missing = Vec::new();
    for outcome in outcomes {
        let market: Vec<f64> = estimates
            .iter()
            .filter(|e| e.source == ProbabilitySource::Market && &e.outcome == outcome)
            .map(|e| e.probability)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .collect();
        if market.is_empty() {
            missing.push(outcome.as_str());
        } else {
            total += market.iter().sum::<f64>() / market.len() as f64;
        }
    }
    if missing.len() == outcomes.len() {
        return None;
    }
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "Market estimates do not cover every outcome, skipping de-vig"
        );
        return None;
    }
    Some(total)
}

fn validate_estimate(est: &ProbabilityEstimate) -> Result<(), EngineError> {
    if !est.probability.is_finite() || est.probability < 0.0 {
        return Err(EngineError::InvalidEstimate(format!(
            "{} probability for {} must be finite and non-negative, got {}",
            est.source, est.outcome, est.probability
        )));
    }
    if let Some(w) = est.weight {
        if !w.is_finite() || w < 0.0 {
            return Err(EngineError::InvalidEstimate(format!(
                "{} weight for {} must be finite and non-negative, got {w}",
                est.source, est.outcome
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
