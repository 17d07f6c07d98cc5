use betting_edge::backtest::{Backtester, ReportStatus};
use betting_edge::config::EngineConfig;
use betting_edge::strategy::arbitrage::BookmakerOptimizer;
use betting_edge::strategy::edge::{EdgeConfig, EdgeDetector, EdgeInputs};
use betting_edge::strategy::kelly::{SizingConfig, StakeSizer};
use betting_edge::strategy::{EventInput, StrategyOrchestrator};
use betting_edge::types::{BankrollState, ProbabilitySource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{estimate, make_event, quote};

#[test]
fn scenario_kelly_sizing() {
    let detector = EdgeDetector::new(EdgeConfig::default()).unwrap();
    let edge = detector
        .score(&EdgeInputs {
            outcome: "home",
            probability: 0.60,
            best_odds: 2.10,
            opening_odds: None,
            model_probability: None,
            arbitrage_margin: None,
        })
        .unwrap();
    let bankroll = BankrollState::new(dec!(1000));

    // Cap loose enough to see the scaled Kelly stake
    let loose = StakeSizer::new(SizingConfig {
        max_stake_percent: 25.0,
        ..SizingConfig::default()
    })
    .unwrap();
    let rec = loose.size(&edge, 0.60, 2.10, &bankroll);
    assert!((rec.kelly_fraction - 0.2364).abs() < 1e-3);
    assert!((rec.scaled_fraction - 0.1182).abs() < 1e-3);
    assert_eq!(rec.stake, dec!(118.18));

    // Default 5% cap wins
    let capped = StakeSizer::new(SizingConfig::default()).unwrap();
    assert_eq!(capped.size(&edge, 0.60, 2.10, &bankroll).stake, dec!(50));
}

#[test]
fn scenario_two_way_arbitrage() {
    let event = make_event("derby", &["home", "away"], 0);
    let quotes = vec![
        quote(&event, "home", "alpha", 2.20, 3),
        quote(&event, "away", "alpha", 1.70, 3),
        quote(&event, "home", "beta", 1.70, 3),
        quote(&event, "away", "beta", 2.20, 3),
    ];
    let book = BookmakerOptimizer::optimize(&event, &quotes).unwrap();
    let arb = book.arbitrage.as_ref().unwrap();
    assert!((arb.implied_sum - 2.0 / 2.2).abs() < 1e-12);
    assert!((arb.margin - 9.0909).abs() < 1e-3);

    let plan = arb.stake_plan(1000.0);
    let (home, away) = (&plan.legs[0], &plan.legs[1]);
    assert_eq!((home.bookmaker.as_str(), away.bookmaker.as_str()), ("alpha", "beta"));
    assert!((home.stake - away.stake).abs() < 1e-9);
    assert!((home.payout - away.payout).abs() < 1e-9);
    assert!((plan.final_value() - 1000.0 * (1.0 + arb.margin / 100.0)).abs() < 1e-6);
}

#[test]
fn scenario_empty_history() {
    let report = Backtester::new(&EngineConfig::default())
        .unwrap()
        .run(&[], dec!(1000))
        .unwrap();
    assert_eq!(report.status, ReportStatus::NoData);
    assert_eq!(report.total_bets, 0);
    assert_eq!(report.total_staked, Decimal::ZERO);
    assert_eq!(report.roi_pct, None);
    assert_eq!(report.profit_factor, None);
}

#[test]
fn scenario_sub_evens_quote_excluded() {
    let event = make_event("cup", &["home", "away"], 0);
    let input = EventInput {
        quotes: vec![quote(&event, "home", "alpha", 0.95, 1)],
        estimates: vec![
            estimate("home", 0.9, ProbabilitySource::Statistical),
            estimate("away", 0.1, ProbabilitySource::Statistical),
        ],
        event,
    };
    assert!(BookmakerOptimizer::optimize(&input.event, &input.quotes).is_none());

    let eval = StrategyOrchestrator::new(&EngineConfig::default())
        .unwrap()
        .evaluate(&input, &BankrollState::new(dec!(1000)))
        .unwrap();
    assert!(eval.book.is_none());
    assert!(eval.records.is_empty());
}
