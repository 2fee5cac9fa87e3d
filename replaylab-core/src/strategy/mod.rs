//! Strategies: consume a bar, optionally emit an order request.
//!
//! Strategies never touch the bus themselves. `StrategyHost` adapts one to
//! the component model: BAR in, ORDER_REQUEST out.

pub mod random;
pub mod trend;

pub use random::RandomTrader;
pub use trend::TrendFollower;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Bar, OrderRequest};
use crate::engine::Component;
use crate::error::{ConfigError, HandlerError};
use crate::event::{Event, EventBus, EventKind};
use crate::rng::RngHierarchy;

/// Order size used by the built-in strategies.
pub const DEFAULT_QUANTITY: f64 = 0.1;

pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn on_bar(&mut self, symbol: &str, bar: &Bar) -> Option<OrderRequest>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Long,
    Short,
}

/// Built-in strategies, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    #[serde(rename = "fake_trend")]
    Trend,
    #[serde(rename = "fake_random")]
    Random,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Trend => "fake_trend",
            StrategyKind::Random => "fake_random",
        }
    }

    pub fn build(self, rngs: &RngHierarchy) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Trend => Box::new(TrendFollower::default()),
            StrategyKind::Random => Box::new(RandomTrader::new(rngs)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fake_trend" => Ok(StrategyKind::Trend),
            "fake_random" => Ok(StrategyKind::Random),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Runs a strategy on every BAR and publishes what it returns.
pub struct StrategyHost {
    bus: Arc<EventBus>,
    strategy: Mutex<Box<dyn Strategy>>,
    name: String,
}

impl StrategyHost {
    pub fn new(bus: Arc<EventBus>, strategy: Box<dyn Strategy>) -> Self {
        let name = format!("Strategy[{}]", strategy.name());
        Self {
            bus,
            strategy: Mutex::new(strategy),
            name,
        }
    }
}

impl Component for StrategyHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Bar]
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let bar = event.as_bar()?;
        let order = self
            .strategy
            .lock()
            .map_err(|_| HandlerError::Poisoned(self.name.clone()))?
            .on_bar(&bar.symbol, &bar.bar);
        if let Some(order) = order {
            debug!(
                strategy = %self.name,
                symbol = %order.symbol,
                side = %order.side,
                quantity = order.quantity,
                "order request"
            );
            self.bus.publish(order, &self.name);
        }
        Ok(())
    }
}
