//! Backtest runner: wires file loading, the engine, and fingerprinting.
//!
//! Entry points:
//! - `run_single_backtest()`: loads bars from a file, then runs. Used by the CLI.
//! - `run_backtest_from_bars()`: pre-loaded bars, no I/O.
//! - `run_determinism_check()`: N independent runs in parallel, fingerprints compared.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use replaylab_core::domain::Bar;
use replaylab_core::engine::{BacktestEngine, EngineConfig, EngineStats};
use replaylab_core::replay::ReplayStats;
use replaylab_core::{BacktestReport, ConfigError, EngineError, RunFingerprint};

use crate::config::BacktestConfig;
use crate::data_loader::{load_bars, LoadError};

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("a determinism check needs at least 2 runs, got {0}")]
    TooFewRuns(usize),
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config: EngineConfig,
    pub bar_count: usize,
    pub report: BacktestReport,
    pub fingerprint: RunFingerprint,
    pub stats: EngineStats,
    pub replay: Option<ReplayStats>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load bars from `data` and run the configured backtest.
pub fn run_single_backtest(config: &BacktestConfig, data: &Path) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let bars = load_bars(data)?;
    run_backtest_from_bars(&config.to_engine_config(), &bars)
}

/// Run one backtest on pre-loaded bars.
pub fn run_backtest_from_bars(
    config: &EngineConfig,
    bars: &[Bar],
) -> Result<BacktestResult, RunError> {
    let mut engine = BacktestEngine::new(config.clone())?;
    let report = engine.run(bars)?;
    let fingerprint = RunFingerprint::compute(bars, &report);
    info!(
        run_hash = fingerprint.short(),
        trades = report.num_trades,
        "run complete"
    );
    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        config: config.clone(),
        bar_count: bars.len(),
        stats: engine.stats(),
        replay: engine.replay_stats(),
        report,
        fingerprint,
    })
}

/// Outcome of running the same config several times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterminismReport {
    pub runs: usize,
    pub fingerprints: Vec<RunFingerprint>,
    /// Distinct run hashes, in first-seen order.
    pub distinct_run_hashes: Vec<String>,
}

impl DeterminismReport {
    pub fn is_deterministic(&self) -> bool {
        self.distinct_run_hashes.len() == 1
    }
}

/// Run `runs` independent engines over the same bars in parallel.
///
/// Each run builds its own bus, clock and RNG streams from the config seed,
/// so any hash mismatch is a real nondeterminism.
pub fn run_determinism_check(
    config: &EngineConfig,
    bars: &[Bar],
    runs: usize,
) -> Result<DeterminismReport, RunError> {
    if runs < 2 {
        return Err(RunError::TooFewRuns(runs));
    }
    config.validate()?;

    let fingerprints = (0..runs)
        .into_par_iter()
        .map(|_| run_backtest_from_bars(config, bars).map(|r| r.fingerprint))
        .collect::<Result<Vec<_>, _>>()?;

    let mut distinct_run_hashes: Vec<String> = Vec::new();
    for fp in &fingerprints {
        if !distinct_run_hashes.contains(&fp.run_hash) {
            distinct_run_hashes.push(fp.run_hash.clone());
        }
    }
    let report = DeterminismReport {
        runs,
        fingerprints,
        distinct_run_hashes,
    };
    if report.is_deterministic() {
        info!(runs, "all runs produced identical fingerprints");
    } else {
        warn!(
            runs,
            distinct = report.distinct_run_hashes.len(),
            "runs diverged"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replaylab_core::replay::ReplayOptions;
    use replaylab_core::StrategyKind;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                Bar::new(60.0 * i as f64, close, close + 1.0, close - 1.0, close, 1.0)
            })
            .collect()
    }

    fn fast_config(strategy: StrategyKind) -> EngineConfig {
        EngineConfig {
            speed: 1e9,
            strategy,
            replay: ReplayOptions {
                deterministic: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn result_carries_fingerprint_and_stats() {
        let result = run_backtest_from_bars(&fast_config(StrategyKind::Trend), &bars(40)).unwrap();
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.bar_count, 40);
        assert_eq!(result.fingerprint.num_trades, result.report.num_trades);
        assert_eq!(result.replay.unwrap().bars_emitted, 40);
        assert!(result.stats.events_published > 40);
    }

    #[test]
    fn parallel_runs_agree() {
        let report =
            run_determinism_check(&fast_config(StrategyKind::Random), &bars(60), 4).unwrap();
        assert_eq!(report.runs, 4);
        assert_eq!(report.fingerprints.len(), 4);
        assert!(report.is_deterministic());
    }

    #[test]
    fn single_run_is_not_a_check() {
        assert!(matches!(
            run_determinism_check(&fast_config(StrategyKind::Trend), &bars(5), 1),
            Err(RunError::TooFewRuns(1))
        ));
    }
}
