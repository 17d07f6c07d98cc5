//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section is optional; missing keys fall back to the documented defaults.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::strategy::definition::StrategyDefinition;
use crate::strategy::edge::EdgeConfig;
use crate::strategy::kelly::SizingConfig;
use crate::strategy::probability::AggregatorConfig;
use crate::types::EngineError;

/// Current configuration schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Everything the decision pipeline needs. Versioned so saved configs can
/// be matched against the engine that produced a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub version: u32,
    pub aggregator: AggregatorConfig,
    pub edge: EdgeConfig,
    pub sizing: SizingConfig,
    pub strategy: StrategyDefinition,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            aggregator: AggregatorConfig::default(),
            edge: EdgeConfig::default(),
            sizing: SizingConfig::default(),
            strategy: StrategyDefinition::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version != CONFIG_VERSION {
            return Err(EngineError::Configuration(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        self.aggregator.validate()?;
        self.edge.validate()?;
        self.sizing.validate()?;
        self.strategy.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_bankroll: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(1000),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub backtest: BacktestConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.engine.validate()?;
        if config.backtest.initial_bankroll <= Decimal::ZERO {
            anyhow::bail!(
                "backtest.initial_bankroll must be positive, got {}",
                config.backtest.initial_bankroll
            );
        }
        Ok(config)
    }
}
