//! Live engine state: bankroll ownership and settlement.

pub mod accountant;

pub use accountant::Accountant;
