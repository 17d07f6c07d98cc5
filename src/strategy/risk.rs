//! Risk adjustments applied on top of the scaled Kelly fraction.
//!
//! Halts stakes once the bankroll falls too far below its peak and reacts to
//! win/loss streaks. Both adjustments are pure functions of a bankroll
//! snapshot.

use tracing::debug;

use super::kelly::SizingConfig;
use crate::types::BankrollState;

/// Multipliers derived from a bankroll snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAdjustment {
    /// 1.0 within the drawdown tolerance; beyond it `(1 − drawdown / tolerance)`
    /// floored at 0.
    pub drawdown_factor: f64,
    /// 0.75 on a long losing streak, 1.10 on a long winning streak, else 1.0.
    pub streak_factor: f64,
}

impl RiskAdjustment {
    pub fn combined(&self) -> f64 {
        self.drawdown_factor * self.streak_factor
    }
}

/// Compute the drawdown and streak multipliers for a snapshot.
pub fn assess(config: &SizingConfig, state: &BankrollState) -> RiskAdjustment {
    let drawdown = state.drawdown();
    let drawdown_factor = if drawdown > config.max_drawdown_tolerance {
        (1.0 - drawdown / config.max_drawdown_tolerance).max(0.0)
    } else {
        1.0
    };

    let streak_factor = if state.losing_streak() >= config.losing_streak_threshold {
        config.losing_streak_multiplier
    } else if state.winning_streak() >= config.winning_streak_threshold {
        config.winning_streak_multiplier
    } else {
        1.0
    };

    if drawdown_factor < 1.0 || streak_factor != 1.0 {
        debug!(
            drawdown = format!("{:.1}%", drawdown * 100.0),
            drawdown_factor,
            streak = state.streak,
            streak_factor,
            "Risk adjustment applied"
        );
    }

    RiskAdjustment {
        drawdown_factor,
        streak_factor,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
