//! Betting edge & risk engine.
//!
//! Turns odds quotes and probability estimates into sized, risk-managed
//! bet decisions and validates strategies against resolved history.
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod backtest;
pub mod config;
pub mod engine;
pub mod storage;
pub mod strategy;
pub mod types;
