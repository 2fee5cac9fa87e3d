//! Simulated market: price feed plus order execution.
//!
//! On BAR it remembers the bar and publishes PRICE_UPDATE at the close. On
//! ORDER_REQUEST it asks the policy guard (when one is attached), fills against
//! the latest bar for the symbol and publishes ORDER_FILLED.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::{Component, PolicyGuard};
use crate::domain::{Bar, Fill, OrderRequest};
use crate::error::{DomainError, HandlerError};
use crate::event::{Event, EventBus, EventKind, PriceUpdate};
use crate::execution::FillEngine;

pub struct MarketSimulator {
    bus: Arc<EventBus>,
    last_bars: Mutex<HashMap<String, Bar>>,
    fill_engine: Mutex<FillEngine>,
    policy: Option<Arc<PolicyGuard>>,
}

impl MarketSimulator {
    pub const NAME: &'static str = "MarketSimulator";

    pub fn new(bus: Arc<EventBus>, fill_engine: FillEngine) -> Self {
        Self {
            bus,
            last_bars: Mutex::new(HashMap::new()),
            fill_engine: Mutex::new(fill_engine),
            policy: None,
        }
    }

    /// Route every valid order through `policy` before filling.
    pub fn with_policy(mut self, policy: Arc<PolicyGuard>) -> Self {
        self.policy = Some(policy);
        self
    }

    fn poisoned() -> HandlerError {
        HandlerError::Poisoned(Self::NAME.into())
    }

    pub fn last_bar(&self, symbol: &str) -> Option<Bar> {
        self.last_bars.lock().ok()?.get(symbol).copied()
    }

    fn on_bar(&self, symbol: &str, bar: &Bar) -> Result<(), HandlerError> {
        self.last_bars
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert(symbol.to_string(), *bar);
        self.bus.publish(
            PriceUpdate {
                symbol: symbol.to_string(),
                price: bar.close,
                timestamp: bar.timestamp,
            },
            Self::NAME,
        );
        Ok(())
    }

    /// Bar to fill against: the latest one for the symbol, else one built from
    /// the limit price.
    fn reference_bar(&self, order: &OrderRequest) -> Result<Result<Bar, DomainError>, HandlerError> {
        let last = self
            .last_bars
            .lock()
            .map_err(|_| Self::poisoned())?
            .get(&order.symbol)
            .copied();
        Ok(match (last, order.limit_price) {
            (Some(bar), _) => Ok(bar),
            (None, Some(price)) => Ok(Bar::new(0.0, price, price, price, price, 0.0)),
            (None, None) => Err(DomainError::NoPriceReference {
                symbol: order.symbol.clone(),
            }),
        })
    }

    fn on_order(&self, order: &OrderRequest) -> Result<(), HandlerError> {
        if let Err(err) = order.validate() {
            warn!(symbol = %order.symbol, error = %err, "order rejected");
            return Ok(());
        }
        if let Some(policy) = &self.policy {
            if !policy.check_order(order).allowed {
                return Ok(());
            }
        }
        let reference = match self.reference_bar(order)? {
            Ok(bar) => bar,
            Err(err) => {
                warn!(symbol = %order.symbol, side = %order.side, error = %err, "order dropped");
                return Ok(());
            }
        };
        let fill: Fill = self
            .fill_engine
            .lock()
            .map_err(|_| Self::poisoned())?
            .fill(order, &reference);
        self.bus.publish(fill, Self::NAME);
        Ok(())
    }
}

impl Component for MarketSimulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Bar, EventKind::OrderRequest]
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match event.kind() {
            EventKind::Bar => {
                let bar = event.as_bar()?;
                self.on_bar(&bar.symbol, &bar.bar)
            }
            _ => self.on_order(event.as_order_request()?),
        }
    }
}
