use betting_edge::backtest::{Backtester, HistoricalRecord, ReportStatus};
use betting_edge::config::EngineConfig;
use betting_edge::storage;
use betting_edge::strategy::definition::StrategyDefinition;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use super::{resolved, value_fixture};

/// Twenty fixtures; the home side wins three times in five.
fn season() -> Vec<HistoricalRecord> {
    (0..20)
        .map(|d| {
            let winner = match d % 5 {
                0 | 2 | 4 => "home",
                1 => "draw",
                _ => "away",
            };
            resolved(value_fixture(&format!("m{d:02}"), d), Some(winner))
        })
        .collect()
}

#[test]
fn test_backtest_is_byte_identical() {
    let bt = Backtester::new(&EngineConfig::default()).unwrap();
    let records = season();
    let first = serde_json::to_string(&bt.run(&records, dec!(1000)).unwrap()).unwrap();
    let second = serde_json::to_string(&bt.run(&records, dec!(1000)).unwrap()).unwrap();
    assert_eq!(first, second);

    // A fresh engine with the same config agrees too
    let again = Backtester::new(&EngineConfig::default()).unwrap();
    let third = serde_json::to_string(&again.run(&records, dec!(1000)).unwrap()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_season_metrics() {
    let report = Backtester::new(&EngineConfig::default())
        .unwrap()
        .run(&season(), dec!(1000))
        .unwrap();
    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.total_bets, 20);
    assert_eq!((report.wins, report.losses), (12, 8));
    assert_eq!(report.win_rate, Some(0.6));
    assert!(report.total_profit > Decimal::ZERO);
    assert!(report.roi_pct.unwrap() > 0.0);
    assert!(report.sharpe_ratio.unwrap() > 0.0);
    assert!(report.profit_factor.unwrap() > 1.0);
    assert_eq!(report.final_bankroll, dec!(1000) + report.total_profit);
    assert_eq!(report.calibration.total_predictions, 60);
    assert!(report.calibration.brier_score.is_some());
}

#[test]
fn test_stakes_respect_cap_and_drawdown_bound() {
    let report = Backtester::new(&EngineConfig::default())
        .unwrap()
        .run(&season(), dec!(1000))
        .unwrap();

    let mut before = report.initial_bankroll;
    for trade in &report.trade_log {
        assert!(trade.stake > Decimal::ZERO);
        assert!(trade.stake <= before * dec!(0.05), "{} > 5% of {before}", trade.stake);
        before = trade.bankroll_after;
    }

    // Largest single observed decline between consecutive points
    let largest_step = report
        .equity_curve
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .map(|w| ((w[0] - w[1]) / w[0]).to_f64().unwrap_or(0.0) * 100.0)
        .fold(0.0_f64, f64::max);
    assert!(report.max_drawdown_pct <= 100.0);
    assert!(report.max_drawdown_pct + 1e-9 >= largest_step);
}

#[test]
fn test_independent_backtests_in_parallel() {
    let config = EngineConfig::default();
    let records = season();
    let strategies = [
        StrategyDefinition::default(),
        StrategyDefinition {
            name: "quarter-kelly".into(),
            kelly_scale: Some(0.25),
            ..StrategyDefinition::default()
        },
        StrategyDefinition {
            name: "picky".into(),
            min_edge: 50.0,
            ..StrategyDefinition::default()
        },
    ];

    let reports: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = strategies
            .iter()
            .map(|strategy| {
                let (config, records) = (&config, &records);
                s.spawn(move || {
                    Backtester::with_strategy(config, strategy.clone())
                        .unwrap()
                        .run(records, dec!(1000))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(reports[0].strategy, "default");
    assert!(reports[1].total_staked < reports[0].total_staked);
    assert_eq!(reports[2].status, ReportStatus::NoBets);
    assert_eq!(reports[2].final_bankroll, dec!(1000));
}

#[tokio::test]
async fn test_dataset_file_replays_like_memory() {
    let records = season();
    let mut path = std::env::temp_dir();
    path.push(format!("betting_edge_season_{}.json", uuid::Uuid::new_v4()));
    storage::save_report(&records, &path).await.unwrap();

    let loaded = storage::load_dataset(&path).await.unwrap();
    assert_eq!(loaded, records);

    let bt = Backtester::new(&EngineConfig::default()).unwrap();
    assert_eq!(
        bt.run(&loaded, dec!(1000)).unwrap(),
        bt.run(&records, dec!(1000)).unwrap()
    );

    tokio::fs::remove_file(&path).await.unwrap();
}
