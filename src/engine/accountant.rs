//! Accountant: owns the live bankroll and applies settlements to it.
//!
//! Settlements may arrive from several tasks at once; they are serialized
//! through a mutex so every settlement observes the state left by the
//! previous one. Evaluation works on snapshots and never holds the lock.
//!
//! Each decision id settles at most once. A repeated settlement callback
//! for the same decision is rejected even when the caller still holds the
//! `Placed` copy.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{
    BankrollState, BetDecision, BetStatus, EngineError, Settlement, SettlementReceipt,
};

/// State guarded by the accountant's lock.
struct Ledger {
    bankroll: BankrollState,
    /// Terminal status of every decision settled so far.
    settled: HashMap<Uuid, BetStatus>,
}

pub struct Accountant {
    ledger: Mutex<Ledger>,
}

impl Accountant {
    pub fn new(initial_bankroll: Decimal) -> Self {
        Self::from_state(BankrollState::new(initial_bankroll))
    }

    pub fn from_state(state: BankrollState) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                bankroll: state,
                settled: HashMap::new(),
            }),
        }
    }

    /// Copy of the current bankroll, for sizing new decisions.
    pub fn snapshot(&self) -> BankrollState {
        self.lock().bankroll.clone()
    }

    /// Terminal status recorded for `id`, if it has been settled here.
    pub fn settled_status(&self, id: Uuid) -> Option<BetStatus> {
        self.lock().settled.get(&id).copied()
    }

    /// Settle a decision against the live bankroll.
    ///
    /// The state is only replaced when the settlement succeeds, so a
    /// rejected settlement leaves the bankroll untouched. A decision id
    /// that was already settled is rejected with `InvalidTransition`.
    pub fn settle(
        &self,
        decision: &BetDecision,
        settlement: &Settlement,
    ) -> Result<SettlementReceipt, EngineError> {
        let mut ledger = self.lock();
        if let Some(&from) = ledger.settled.get(&decision.id) {
            warn!(bet_id = %decision.id, status = %from, "Repeated settlement rejected");
            return Err(EngineError::InvalidTransition {
                id: decision.id,
                from,
                to: settlement.outcome.status(),
            });
        }

        let receipt = ledger.bankroll.settle(decision, settlement)?;
        ledger.bankroll = receipt.bankroll.clone();
        ledger.settled.insert(decision.id, receipt.decision.status);

        let state = &ledger.bankroll;
        info!(
            bet_id = %decision.id,
            outcome = %decision.outcome,
            result = %receipt.decision.status,
            pnl = %receipt.pnl,
            bankroll = %state.bankroll,
            drawdown = format!("{:.1}%", state.drawdown() * 100.0),
            "Bet settled"
        );
        if state.bankroll <= Decimal::ZERO {
            warn!(bankroll = %state.bankroll, "Bankroll exhausted");
        }

        Ok(receipt)
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // The ledger is only written after a settlement succeeds, so a
        // poisoned guard still holds a consistent state.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
