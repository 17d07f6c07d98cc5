use betting_edge::config::{AppConfig, EngineConfig};
use betting_edge::strategy::{SkipReason, StrategyOrchestrator};
use betting_edge::types::{BankrollState, BetStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::value_fixture;

#[test]
fn test_value_fixture_proposes_home() {
    let orchestrator = StrategyOrchestrator::new(&EngineConfig::default()).unwrap();
    let bankroll = BankrollState::new(dec!(1000));
    let eval = orchestrator.evaluate(&value_fixture("ev1", 0), &bankroll).unwrap();

    let book = eval.book.as_ref().unwrap();
    assert!(book.complete);
    assert!(book.arbitrage.is_none());
    assert_eq!(book.best_price("home").unwrap().price, 2.15);
    assert_eq!(book.best_price("draw").unwrap().bookmaker, "alpha");

    let decisions: Vec<_> = eval.proposed().collect();
    assert_eq!(decisions.len(), 1);
    let d = decisions[0];
    assert_eq!(d.outcome, "home");
    assert_eq!(d.bookmaker, "alpha");
    assert_eq!(d.status, BetStatus::Proposed);
    // 2.00 → 2.15 since opening
    assert!((d.edge.movement_edge - 7.5).abs() < 1e-9);
    assert!(d.edge.model_edge > d.edge.base_edge);
    assert_eq!(d.confidence, 8);
    assert!(d.stake > Decimal::ZERO && d.stake <= dec!(50));
    assert!(d.expected_value() > 0.0);

    assert_eq!(eval.skip_reason("draw"), Some(SkipReason::NoEdge));
    assert_eq!(eval.skip_reason("away"), Some(SkipReason::NoEdge));
}

#[test]
fn test_concurrent_evaluation_matches_sequential() {
    let orchestrator = StrategyOrchestrator::new(&EngineConfig::default()).unwrap();
    let bankroll = BankrollState::new(dec!(2500));
    let inputs: Vec<_> = (0..8).map(|d| value_fixture(&format!("ev{d}"), d)).collect();

    let sequential: Vec<_> = inputs
        .iter()
        .map(|i| orchestrator.evaluate(i, &bankroll).unwrap())
        .collect();

    let (shared, snapshot) = (&orchestrator, &bankroll);
    let parallel: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|i| s.spawn(move || shared.evaluate(i, snapshot).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.book, b.book);
        assert_eq!(a.probabilities, b.probabilities);
        let stakes = |e: &betting_edge::strategy::EventEvaluation| {
            e.proposed().map(|d| (d.outcome.clone(), d.stake)).collect::<Vec<_>>()
        };
        assert_eq!(stakes(a), stakes(b));
    }
    // Evaluation never touches the snapshot
    assert_eq!(bankroll, BankrollState::new(dec!(2500)));
}

#[test]
fn test_config_driven_strategy() {
    let cfg = AppConfig::parse(
        r#"
        [engine.strategy]
        name = "high-confidence"
        min_confidence = 9
        "#,
    )
    .unwrap();
    let orchestrator = StrategyOrchestrator::new(&cfg.engine).unwrap();
    let eval = orchestrator
        .evaluate(&value_fixture("ev1", 0), &BankrollState::new(dec!(1000)))
        .unwrap();
    assert_eq!(eval.proposed().count(), 0);
    assert_eq!(eval.skip_reason("home"), Some(SkipReason::BelowMinConfidence));
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let mut cfg = EngineConfig::default();
    cfg.sizing.kelly_scale = 0.0;
    assert!(StrategyOrchestrator::new(&cfg).is_err());
}
