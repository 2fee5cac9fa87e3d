//! ReplayLab Core — event bus, virtual clock, replay, execution, ledger, orchestration.
//!
//! This crate contains the heart of the replay engine:
//! - Domain types (bars, orders, fills, positions, equity samples)
//! - Synchronous publish/subscribe event bus with typed payloads
//! - Virtual clock and bar replayer paced by it
//! - Fill engine with pluggable slippage
//! - Position ledger, trade/equity recorder and report metrics
//! - Policy guard gating run starts and order submission
//! - Backtest orchestrator with component lifecycle
//! - Deterministic RNG hierarchy and run fingerprints

pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod execution;
pub mod fingerprint;
pub mod replay;
pub mod report;
pub mod rng;
pub mod strategy;

pub use clock::VirtualClock;
pub use engine::{BacktestEngine, EngineConfig, EngineState, EngineStats, PolicyGuard};
pub use error::{ComponentError, ConfigError, DomainError, EngineError, HandlerError};
pub use event::{Event, EventBus, EventKind, EventPayload};
pub use fingerprint::RunFingerprint;
pub use replay::{MonotonicityPolicy, ReplayOptions, ReplayStats, Replayer};
pub use report::BacktestReport;
pub use strategy::{Strategy, StrategyKind};
