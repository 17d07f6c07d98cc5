use std::sync::Arc;

use betting_edge::config::EngineConfig;
use betting_edge::engine::Accountant;
use betting_edge::strategy::StrategyOrchestrator;
use betting_edge::types::{BetDecision, BetStatus, EngineError, Settlement};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::value_fixture;

/// One placed bet per fixture, all sized against the same snapshot.
fn placed_bets(accountant: &Accountant, n: i64) -> Vec<BetDecision> {
    let orchestrator = StrategyOrchestrator::new(&EngineConfig::default()).unwrap();
    let snapshot = accountant.snapshot();
    (0..n)
        .flat_map(|d| {
            orchestrator
                .evaluate(&value_fixture(&format!("ev{d}"), d), &snapshot)
                .unwrap()
                .into_decisions()
        })
        .map(|mut d| {
            d.place().unwrap();
            d
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settlements_serialize() {
    let accountant = Arc::new(Accountant::new(dec!(1000)));
    let bets = placed_bets(&accountant, 12);
    assert_eq!(bets.len(), 12);

    let handles: Vec<_> = bets
        .into_iter()
        .enumerate()
        .map(|(i, bet)| {
            let accountant = Arc::clone(&accountant);
            tokio::spawn(async move {
                let settlement = if i % 3 == 0 {
                    Settlement::lost(bet.odds)
                } else {
                    Settlement::won(bet.odds)
                };
                accountant.settle(&bet, &settlement).unwrap()
            })
        })
        .collect();

    let mut total_pnl = Decimal::ZERO;
    let mut ids = Vec::new();
    for handle in handles {
        let receipt = handle.await.unwrap();
        total_pnl += receipt.pnl;
        ids.push(receipt.decision.id);
    }

    let state = accountant.snapshot();
    // No settlement lost to a race
    assert_eq!(state.bankroll, dec!(1000) + total_pnl);
    assert_eq!(state.equity_curve.len(), 13);
    assert!(state.peak_bankroll >= state.bankroll);
    assert!(ids.iter().all(|id| accountant.settled_status(*id).is_some()));
}

#[test]
fn test_threaded_settlement_rejects_double_settle() {
    let accountant = Accountant::new(dec!(500));
    let bet = placed_bets(&accountant, 1).remove(0);

    let receipt = std::thread::scope(|s| {
        s.spawn(|| accountant.settle(&bet, &Settlement::won(bet.odds)))
            .join()
            .unwrap()
    })
    .unwrap();
    assert_eq!(receipt.decision.status, BetStatus::Won);

    // A retried callback replays the original placed decision
    let second = std::thread::scope(|s| {
        s.spawn(|| accountant.settle(&bet, &Settlement::won(bet.odds)))
            .join()
            .unwrap()
    });
    assert!(matches!(
        second,
        Err(EngineError::InvalidTransition { from: BetStatus::Won, .. })
    ));
    // So does the terminal copy from the receipt
    assert!(accountant
        .settle(&receipt.decision, &Settlement::lost(bet.odds))
        .is_err());

    let state = accountant.snapshot();
    assert_eq!(state.bankroll, dec!(500) + receipt.pnl);
    assert_eq!(state.equity_curve.len(), 2);
}

#[test]
fn test_void_settlement_keeps_bankroll() {
    let accountant = Accountant::new(dec!(1000));
    let bet = placed_bets(&accountant, 1).remove(0);
    let receipt = accountant.settle(&bet, &Settlement::void(bet.odds)).unwrap();
    assert_eq!(receipt.pnl, Decimal::ZERO);
    assert_eq!(receipt.decision.realized_odds, Some(bet.odds));
    assert_eq!(accountant.snapshot().bankroll, dec!(1000));
}
