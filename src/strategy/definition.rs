//! Strategy definitions: the thresholds (and optional predicate) deciding
//! which priced, sized opportunities are actually taken.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::kelly::SizingConfig;
use crate::types::{EdgeScore, EngineError};

/// A candidate bet as seen by a strategy filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity<'a> {
    pub event_id: &'a str,
    pub outcome: &'a str,
    pub bookmaker: &'a str,
    pub odds: f64,
    pub probability: f64,
    pub edge: &'a EdgeScore,
    pub stake_percent: f64,
}

/// Extra acceptance rule on top of the numeric thresholds.
pub type OpportunityFilter = fn(&Opportunity<'_>) -> bool;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyDefinition {
    pub name: String,
    /// Minimum composite edge, in percent.
    pub min_edge: f64,
    /// Minimum confidence (1–10).
    pub min_confidence: u8,
    /// Longest decimal odds the strategy will back.
    pub max_odds: f64,
    /// Stake cap in percent of bankroll; tightens the sizing cap.
    pub max_stake_percent: f64,
    /// Replaces the sizing `kelly_scale` when set.
    pub kelly_scale: Option<f64>,
    #[serde(skip)]
    pub filter: Option<OpportunityFilter>,
}

impl fmt::Debug for StrategyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyDefinition")
            .field("name", &self.name)
            .field("min_edge", &self.min_edge)
            .field("min_confidence", &self.min_confidence)
            .field("max_odds", &self.max_odds)
            .field("max_stake_percent", &self.max_stake_percent)
            .field("kelly_scale", &self.kelly_scale)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Default for StrategyDefinition {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_edge: 0.0,
            min_confidence: 1,
            max_odds: 10.0,
            max_stake_percent: 5.0,
            kelly_scale: None,
            filter: None,
        }
    }
}

impl StrategyDefinition {
    pub fn with_filter(mut self, filter: OpportunityFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.min_edge.is_finite() {
            return Err(EngineError::Configuration(format!(
                "strategy {}: min_edge must be finite",
                self.name
            )));
        }
        if !(1..=10).contains(&self.min_confidence) {
            return Err(EngineError::Configuration(format!(
                "strategy {}: min_confidence must be 1..=10, got {}",
                self.name, self.min_confidence
            )));
        }
        if !self.max_odds.is_finite() || self.max_odds <= 1.0 {
            return Err(EngineError::Configuration(format!(
                "strategy {}: max_odds must be above 1.0, got {}",
                self.name, self.max_odds
            )));
        }
        if !self.max_stake_percent.is_finite()
            || self.max_stake_percent <= 0.0
            || self.max_stake_percent > 100.0
        {
            return Err(EngineError::Configuration(format!(
                "strategy {}: max_stake_percent must be in (0, 100], got {}",
                self.name, self.max_stake_percent
            )));
        }
        if let Some(scale) = self.kelly_scale {
            if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
                return Err(EngineError::Configuration(format!(
                    "strategy {}: kelly_scale must be in (0, 1], got {scale}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Sizing parameters with this strategy's overrides applied.
    pub fn sizing(&self, base: &SizingConfig) -> SizingConfig {
        SizingConfig {
            kelly_scale: self.kelly_scale.unwrap_or(base.kelly_scale),
            max_stake_percent: base.max_stake_percent.min(self.max_stake_percent),
            ..base.clone()
        }
    }

    /// Apply the custom predicate, if any.
    pub fn accepts(&self, opportunity: &Opportunity<'_>) -> bool {
        self.filter.map_or(true, |f| f(opportunity))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
