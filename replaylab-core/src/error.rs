//! Error taxonomy for the replay engine.
//!
//! - `ConfigError`: fatal, raised before any run starts.
//! - `HandlerError`: returned by a subscribed handler; isolated by the bus.
//! - `DomainError`: bad data inside an otherwise healthy run; logged and skipped.
//! - `ComponentError`: a component failed to start; halts the orchestrator.
//! - `EngineError`: what the orchestrator reports to its caller.

use thiserror::Error;

use crate::event::EventKind;

/// Invalid configuration or input data. Always fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid speed {0}: must be finite and > 0")]
    InvalidSpeed(f64),

    #[error("invalid slippage percent {0}: must be finite and >= 0")]
    InvalidSlippage(f64),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("bar {index}: missing required field '{field}'")]
    MissingBarField { index: usize, field: String },

    #[error("bar {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("bar {index} timestamp {timestamp} precedes previous bar timestamp {previous}")]
    NonMonotonicBars {
        index: usize,
        timestamp: f64,
        previous: f64,
    },

    #[error("unknown strategy '{0}' (expected fake_trend or fake_random)")]
    UnknownStrategy(String),
}

/// Failure inside an event handler.
///
/// Never propagates past `EventBus::publish`; the bus logs and counts it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    #[error("unexpected payload for {expected}: got {actual}")]
    UnexpectedPayload { expected: EventKind, actual: EventKind },

    #[error("state lock poisoned in {0}")]
    Poisoned(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Bad data encountered mid-run. The offending operation is skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("unknown order side '{0}'")]
    UnknownSide(String),

    #[error("unknown order kind '{0}'")]
    UnknownOrderKind(String),

    #[error("malformed timestamp '{0}'")]
    MalformedTimestamp(String),

    #[error("no price reference for {symbol}: no bar seen and no limit price")]
    NoPriceReference { symbol: String },

    #[error("invalid order quantity {0}: must be finite and > 0")]
    InvalidQuantity(f64),
}

/// A component could not be brought up.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComponentError {
    #[error("{component} failed to start: {reason}")]
    StartFailed { component: String, reason: String },
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("startup halted: {0}")]
    Startup(#[from] ComponentError),

    #[error("engine already ran (state {0}); build a new engine for another run")]
    AlreadyRan(String),

    #[error("engine state lock poisoned")]
    Poisoned,
}
