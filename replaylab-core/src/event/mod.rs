//! Events and the synchronous publish/subscribe bus.

mod bus;
mod kind;
mod payload;

pub use bus::{BusStats, EventBus, Handler, SubscriptionId};
pub use kind::EventKind;
pub use payload::{
    BarEvent, EventPayload, Heartbeat, PriceUpdate, SystemErrorNotice, SystemNotice, Tick,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Fill, OrderRequest, PositionSnapshot};
use crate::error::HandlerError;

/// An immutable, published event.
///
/// Only the bus builds these. The kind always matches the payload variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    kind: EventKind,
    payload: EventPayload,
    /// Wall-clock capture time.
    timestamp: DateTime<Utc>,
    source: String,
}

impl Event {
    pub(crate) fn new(payload: EventPayload, source: impl Into<String>) -> Self {
        Self {
            kind: payload.kind(),
            payload,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn mismatch(&self, expected: EventKind) -> HandlerError {
        HandlerError::UnexpectedPayload {
            expected,
            actual: self.kind,
        }
    }

    pub fn as_bar(&self) -> Result<&BarEvent, HandlerError> {
        match &self.payload {
            EventPayload::Bar(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::Bar)),
        }
    }

    pub fn as_tick(&self) -> Result<&Tick, HandlerError> {
        match &self.payload {
            EventPayload::Tick(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::Tick)),
        }
    }

    pub fn as_price_update(&self) -> Result<&PriceUpdate, HandlerError> {
        match &self.payload {
            EventPayload::PriceUpdate(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::PriceUpdate)),
        }
    }

    pub fn as_order_request(&self) -> Result<&OrderRequest, HandlerError> {
        match &self.payload {
            EventPayload::OrderRequest(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::OrderRequest)),
        }
    }

    pub fn as_fill(&self) -> Result<&Fill, HandlerError> {
        match &self.payload {
            EventPayload::OrderFilled(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::OrderFilled)),
        }
    }

    pub fn as_position_update(&self) -> Result<&PositionSnapshot, HandlerError> {
        match &self.payload {
            EventPayload::PositionUpdate(p) => Ok(p),
            _ => Err(self.mismatch(EventKind::PositionUpdate)),
        }
    }
}
