//! Kelly criterion stake sizing.
//!
//! Computes bet sizes using fractional Kelly, cut off in deep drawdowns,
//! nudged by win/loss streaks and capped at a fixed share of bankroll.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::risk::{self, RiskAdjustment};
use crate::types::{is_valid_price, BankrollState, EdgeScore, EngineError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Stake sizing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fractional Kelly multiplier (0.5 = half-Kelly). Lower = more conservative.
    pub kelly_scale: f64,
    /// Maximum stake as a percentage of bankroll (5.0 = 5%).
    pub max_stake_percent: f64,
    /// Drawdown from peak, as a fraction, beyond which stakes are scaled
    /// by `(1 − drawdown / tolerance)` and so drop to zero.
    pub max_drawdown_tolerance: f64,
    pub losing_streak_threshold: u32,
    pub losing_streak_multiplier: f64,
    pub winning_streak_threshold: u32,
    pub winning_streak_multiplier: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_scale: 0.5,       // Half-Kelly
            max_stake_percent: 5.0, // Max 5% of bankroll per bet
            max_drawdown_tolerance: 0.15,
            losing_streak_threshold: 3,
            losing_streak_multiplier: 0.75,
            winning_streak_threshold: 5,
            winning_streak_multiplier: 1.10,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.kelly_scale.is_finite() || self.kelly_scale <= 0.0 || self.kelly_scale > 1.0 {
            return Err(EngineError::Configuration(format!(
                "kelly_scale must be in (0, 1], got {}",
                self.kelly_scale
            )));
        }
        if !self.max_stake_percent.is_finite()
            || self.max_stake_percent <= 0.0
            || self.max_stake_percent > 100.0
        {
            return Err(EngineError::Configuration(format!(
                "max_stake_percent must be in (0, 100], got {}",
                self.max_stake_percent
            )));
        }
        if !self.max_drawdown_tolerance.is_finite()
            || self.max_drawdown_tolerance <= 0.0
            || self.max_drawdown_tolerance > 1.0
        {
            return Err(EngineError::Configuration(format!(
                "max_drawdown_tolerance must be in (0, 1], got {}",
                self.max_drawdown_tolerance
            )));
        }
        for (name, m) in [
            ("losing_streak_multiplier", self.losing_streak_multiplier),
            ("winning_streak_multiplier", self.winning_streak_multiplier),
        ] {
            if !m.is_finite() || m < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{name} must be finite and non-negative, got {m}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stake sizer
// ---------------------------------------------------------------------------

/// Sized stake recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeRecommendation {
    pub kelly_fraction: f64,    // Raw Kelly fraction
    pub scaled_fraction: f64,   // After kelly_scale
    pub adjustment: RiskAdjustment,
    pub stake_percent: f64,     // After risk adjustments + cap, in percent
    pub stake: Decimal,         // Currency amount
}

impl StakeRecommendation {
    fn no_bet(kelly_fraction: f64) -> Self {
        Self {
            kelly_fraction,
            scaled_fraction: 0.0,
            adjustment: RiskAdjustment {
                drawdown_factor: 1.0,
                streak_factor: 1.0,
            },
            stake_percent: 0.0,
            stake: Decimal::ZERO,
        }
    }

    pub fn is_bet(&self) -> bool {
        self.stake > Decimal::ZERO
    }
}

pub struct StakeSizer {
    config: SizingConfig,
}

impl StakeSizer {
    pub fn new(config: SizingConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the sizing configuration.
    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Size a stake for a scored outcome against a bankroll snapshot.
    ///
    /// Kelly formula: f* = (bp - q) / b
    /// where:
    ///   b = odds - 1 (net odds)
    ///   p = calibrated win probability
    ///   q = 1 - p
    ///
    /// Returns a zero stake, never an error, when the edge is not positive,
    /// the bankroll is empty or the odds are unusable.
    pub fn size(
        &self,
        edge: &EdgeScore,
        probability: f64,
        odds: f64,
        bankroll: &BankrollState,
    ) -> StakeRecommendation {
        if !edge.is_positive()
            || bankroll.bankroll <= Decimal::ZERO
            || !is_valid_price(odds)
            || !probability.is_finite()
        {
            return StakeRecommendation::no_bet(0.0);
        }

        let b = odds - 1.0;
        let p = probability;
        let q = 1.0 - p;
        let kelly = (p * b - q) / b;

        // Negative Kelly means no bet (edge doesn't justify the odds)
        if kelly <= 0.0 {
            debug!(kelly, odds, probability, "Non-positive Kelly, no bet");
            return StakeRecommendation::no_bet(kelly);
        }

        let scaled = kelly * self.config.kelly_scale;
        let adjustment = risk::assess(&self.config, bankroll);
        let adjusted_percent = scaled * adjustment.combined() * 100.0;
        let stake_percent = adjusted_percent.clamp(0.0, self.config.max_stake_percent);

        let stake = Decimal::from_f64(stake_percent / 100.0)
            .map(|fraction| {
                (fraction * bankroll.bankroll)
                    .round_dp_with_strategy(2, RoundingStrategy::ToZero)
                    .max(Decimal::ZERO)
            })
            .unwrap_or(Decimal::ZERO);

        debug!(
            raw_kelly = format!("{:.2}%", kelly * 100.0),
            scaled = format!("{:.2}%", scaled * 100.0),
            stake_percent = format!("{:.2}%", stake_percent),
            stake = %stake,
            "Stake sized"
        );

        StakeRecommendation {
            kelly_fraction: kelly,
            scaled_fraction: scaled,
            adjustment,
            stake_percent,
            stake,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
