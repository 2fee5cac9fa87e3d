//! Engine configuration, lifecycle state, and status counters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_SYMBOL;
use crate::engine::policy::PolicyStats;
use crate::engine::scheduler::SchedulerConfig;
use crate::error::ConfigError;
use crate::replay::ReplayOptions;
use crate::strategy::StrategyKind;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    /// Simulation seconds per wall second.
    pub speed: f64,
    /// Master seed for every random stream in the run.
    pub seed: u64,
    pub slippage_percent: f64,
    pub strategy: StrategyKind,
    pub replay: ReplayOptions,
    /// Simulation start time (epoch seconds). Defaults to the first bar's timestamp.
    pub sim_start: Option<f64>,
    /// Background TICK/HEARTBEAT generation; off when `None`.
    pub scheduler: Option<SchedulerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            speed: 100.0,
            seed: 1337,
            slippage_percent: 0.0,
            strategy: StrategyKind::Trend,
            replay: ReplayOptions::default(),
            sim_start: None,
            scheduler: None,
        }
    }
}

impl EngineConfig {
    pub fn new(strategy: StrategyKind, speed: f64, seed: u64) -> Self {
        Self {
            strategy,
            speed,
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        if !self.slippage_percent.is_finite() || self.slippage_percent < 0.0 {
            return Err(ConfigError::InvalidSlippage(self.slippage_percent));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "symbol".into(),
                reason: "must not be empty".into(),
            });
        }
        if let Some(start) = self.sim_start.filter(|s| !s.is_finite()) {
            return Err(ConfigError::InvalidField {
                field: "sim_start".into(),
                reason: format!("{start} is not finite"),
            });
        }
        if let Some(s) = &self.scheduler {
            if !(s.tick_interval > 0.0 && s.heartbeat_interval > 0.0) {
                return Err(ConfigError::InvalidField {
                    field: "scheduler".into(),
                    reason: "tick and heartbeat intervals must be > 0".into(),
                });
            }
        }
        Ok(())
    }
}

/// Orchestrator lifecycle: `Init → Booting → Running → Halted`, or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    #[default]
    Init,
    Booting,
    Running,
    Halted,
    Error,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Init => "INIT",
            EngineState::Booting => "BOOTING",
            EngineState::Running => "RUNNING",
            EngineState::Halted => "HALTED",
            EngineState::Error => "ERROR",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status counters exposed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub events_published: u64,
    pub subscriber_count: usize,
    pub ticks_generated: u64,
    pub handler_errors: u64,
    pub state: EngineState,
    #[serde(default)]
    pub policy: PolicyStats,
}
