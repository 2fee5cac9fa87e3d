//! ReplayLab Runner — backtests driven from files.
//!
//! This crate builds on `replaylab-core` to provide:
//! - TOML configuration with command-line overrides
//! - Bar loading from CSV and Parquet
//! - Single-run entry point returning report, fingerprint and stats
//! - Parallel determinism verification
//! - JSON and CSV export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{BacktestConfig, ConfigFileError, ConfigOverrides};
pub use data_loader::{load_bars, read_csv, DataFormat, LoadError};
pub use export::{
    export_equity_csv, export_json, export_trades_csv, import_json, load_json, save_equity_csv,
    save_json, save_trades_csv,
};
pub use runner::{
    run_backtest_from_bars, run_determinism_check, run_single_backtest, BacktestResult,
    DeterminismReport, RunError, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<ConfigOverrides>();
        assert_sync::<ConfigOverrides>();
    }

    #[test]
    fn determinism_report_is_send_sync() {
        assert_send::<DeterminismReport>();
        assert_sync::<DeterminismReport>();
    }
}
