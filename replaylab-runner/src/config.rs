//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! symbol = "BTC/USD"
//! strategy = "fake_trend"
//! speed = 100.0
//! seed = 1337
//!
//! [execution]
//! slippage_percent = 0.1
//!
//! [replay]
//! deterministic = true
//! emit_ticks = false
//! monotonicity = "reject"
//!
//! [scheduler]
//! enabled = false
//! tick_interval = 1.0
//! heartbeat_interval = 5.0
//! ```
//!
//! Every field has a default, so an empty file is a valid config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::domain::DEFAULT_SYMBOL;
use replaylab_core::engine::{EngineConfig, SchedulerConfig};
use replaylab_core::replay::{MonotonicityPolicy, ReplayOptions};
use replaylab_core::{ConfigError, StrategyKind};

/// Errors from reading a config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub execution: ExecutionSection,
    pub replay: ReplaySection,
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub speed: f64,
    pub seed: u64,
    /// Epoch seconds; the first bar's timestamp when absent.
    pub sim_start: Option<f64>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            strategy: engine.strategy,
            speed: engine.speed,
            seed: engine.seed,
            sim_start: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub slippage_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySection {
    pub deterministic: bool,
    pub emit_ticks: bool,
    pub monotonicity: MonotonicityPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub enabled: bool,
    pub tick_interval: f64,
    pub heartbeat_interval: f64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            enabled: false,
            tick_interval: defaults.tick_interval,
            heartbeat_interval: defaults.heartbeat_interval,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub symbol: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub speed: Option<f64>,
    pub seed: Option<u64>,
    pub slippage_percent: Option<f64>,
    pub deterministic: bool,
    pub emit_ticks: bool,
    pub strict_timestamps: bool,
}

impl BacktestConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigFileError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_engine_config().validate()
    }

    /// Flags only ever switch options on; they cannot turn off a file setting.
    pub fn apply_overrides(&mut self, o: ConfigOverrides) {
        if let Some(symbol) = o.symbol {
            self.backtest.symbol = symbol;
        }
        if let Some(strategy) = o.strategy {
            self.backtest.strategy = strategy;
        }
        if let Some(speed) = o.speed {
            self.backtest.speed = speed;
        }
        if let Some(seed) = o.seed {
            self.backtest.seed = seed;
        }
        if let Some(slippage) = o.slippage_percent {
            self.execution.slippage_percent = slippage;
        }
        self.replay.deterministic |= o.deterministic;
        self.replay.emit_ticks |= o.emit_ticks;
        if o.strict_timestamps {
            self.replay.monotonicity = MonotonicityPolicy::Reject;
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            symbol: self.backtest.symbol.clone(),
            speed: self.backtest.speed,
            seed: self.backtest.seed,
            slippage_percent: self.execution.slippage_percent,
            strategy: self.backtest.strategy,
            replay: ReplayOptions {
                emit_ticks: self.replay.emit_ticks,
                deterministic: self.replay.deterministic,
                monotonicity: self.replay.monotonicity,
            },
            sim_start: self.backtest.sim_start,
            scheduler: self.scheduler.enabled.then_some(SchedulerConfig {
                tick_interval: self.scheduler.tick_interval,
                heartbeat_interval: self.scheduler.heartbeat_interval,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BacktestConfig::from_toml("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn parses_all_sections() {
        let config = BacktestConfig::from_toml(
            r#"
[backtest]
symbol = "ETH/USD"
strategy = "fake_random"
speed = 50.0
seed = 7

[execution]
slippage_percent = 0.25

[replay]
deterministic = true
monotonicity = "reject"

[scheduler]
enabled = true
tick_interval = 2.0
"#,
        )
        .unwrap();

        let engine = config.to_engine_config();
        assert_eq!(engine.symbol, "ETH/USD");
        assert_eq!(engine.strategy, StrategyKind::Random);
        assert_eq!(engine.speed, 50.0);
        assert_eq!(engine.seed, 7);
        assert_eq!(engine.slippage_percent, 0.25);
        assert!(engine.replay.deterministic);
        assert!(!engine.replay.emit_ticks);
        assert_eq!(engine.replay.monotonicity, MonotonicityPolicy::Reject);
        let scheduler = engine.scheduler.unwrap();
        assert_eq!(scheduler.tick_interval, 2.0);
        assert_eq!(scheduler.heartbeat_interval, 5.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = BacktestConfig::from_toml("[backtest]\nspeed = 0.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Invalid(ConfigError::InvalidSpeed(_))
        ));

        let err = BacktestConfig::from_toml("[execution]\nslippage_percent = -1.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::Invalid(ConfigError::InvalidSlippage(_))
        ));

        let err = BacktestConfig::from_toml("[backtest]\nstrategy = \"martingale\"\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse(_)));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = BacktestConfig::from_toml("[backtest]\nspeed = 10.0\nseed = 1\n").unwrap();
        config.apply_overrides(ConfigOverrides {
            speed: Some(1000.0),
            strategy: Some(StrategyKind::Random),
            deterministic: true,
            strict_timestamps: true,
            ..Default::default()
        });
        assert_eq!(config.backtest.speed, 1000.0);
        assert_eq!(config.backtest.seed, 1);
        assert_eq!(config.backtest.strategy, StrategyKind::Random);
        assert!(config.replay.deterministic);
        assert_eq!(config.replay.monotonicity, MonotonicityPolicy::Reject);
    }
}
