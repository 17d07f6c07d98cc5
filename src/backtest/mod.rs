//! Strategy validation against resolved history.

pub mod calibration;
pub mod runner;

pub use runner::{BacktestReport, Backtester, HistoricalRecord, ReportStatus};
