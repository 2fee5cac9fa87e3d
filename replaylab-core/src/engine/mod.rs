//! Backtesting engine: components wired through the event bus.
//!
//! One replay cycle per bar:
//!
//! 1. Replayer publishes BAR
//! 2. Market publishes PRICE_UPDATE; ledger marks to market and publishes POSITION_UPDATE
//! 3. Recorder samples equity
//! 4. Strategy may publish ORDER_REQUEST; the policy guard clears it, market
//!    fills it and publishes ORDER_FILLED
//! 5. Ledger applies the fill, recorder logs the trade

pub mod accounting;
pub mod component;
pub mod market;
pub mod orchestrator;
pub mod policy;
pub mod recorder;
pub mod scheduler;
pub mod state;

pub use accounting::{Ledger, LedgerService};
pub use component::{Component, Lifecycle};
pub use market::MarketSimulator;
pub use orchestrator::BacktestEngine;
pub use policy::{PolicyDecision, PolicyGuard, PolicyStats};
pub use recorder::{Recorder, Recording};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use state::{EngineConfig, EngineState, EngineStats};
