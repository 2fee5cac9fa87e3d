//! Event payloads: one strongly-typed struct per event kind.

use serde::{Deserialize, Serialize};

use super::EventKind;
use crate::domain::{Bar, Fill, OrderRequest, PositionSnapshot};

/// A replayed bar for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub symbol: String,
    pub bar: Bar,
}

/// Clock tick, emitted by the replayer (one per bar) or by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub tick_number: u64,
    /// Simulation time when the tick was emitted (epoch seconds).
    pub sim_time: f64,
    /// Timestamp of the bar this tick accompanies, if any.
    pub bar_timestamp: Option<f64>,
}

/// Latest traded price for a symbol, derived from a bar close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub heartbeat_number: u64,
    pub sim_time: f64,
    pub ticks_generated: u64,
}

/// Boot / shutdown notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNotice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemErrorNotice {
    /// Where it happened, e.g. `BOOT_FAILED`.
    pub stage: String,
    pub error: String,
}

/// Tagged union of all payloads. The variant determines the event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    Bar(BarEvent),
    Tick(Tick),
    PriceUpdate(PriceUpdate),
    OrderRequest(OrderRequest),
    OrderFilled(Fill),
    PositionUpdate(PositionSnapshot),
    Heartbeat(Heartbeat),
    SystemBoot(SystemNotice),
    SystemShutdown(SystemNotice),
    SystemError(SystemErrorNotice),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Bar(_) => EventKind::Bar,
            EventPayload::Tick(_) => EventKind::Tick,
            EventPayload::PriceUpdate(_) => EventKind::PriceUpdate,
            EventPayload::OrderRequest(_) => EventKind::OrderRequest,
            EventPayload::OrderFilled(_) => EventKind::OrderFilled,
            EventPayload::PositionUpdate(_) => EventKind::PositionUpdate,
            EventPayload::Heartbeat(_) => EventKind::Heartbeat,
            EventPayload::SystemBoot(_) => EventKind::SystemBoot,
            EventPayload::SystemShutdown(_) => EventKind::SystemShutdown,
            EventPayload::SystemError(_) => EventKind::SystemError,
        }
    }

    pub fn boot(message: impl Into<String>) -> Self {
        EventPayload::SystemBoot(SystemNotice {
            message: message.into(),
        })
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        EventPayload::SystemShutdown(SystemNotice {
            message: message.into(),
        })
    }

    pub fn error(stage: impl Into<String>, error: impl Into<String>) -> Self {
        EventPayload::SystemError(SystemErrorNotice {
            stage: stage.into(),
            error: error.into(),
        })
    }
}

impl From<BarEvent> for EventPayload {
    fn from(p: BarEvent) -> Self {
        EventPayload::Bar(p)
    }
}

impl From<Tick> for EventPayload {
    fn from(p: Tick) -> Self {
        EventPayload::Tick(p)
    }
}

impl From<PriceUpdate> for EventPayload {
    fn from(p: PriceUpdate) -> Self {
        EventPayload::PriceUpdate(p)
    }
}

impl From<OrderRequest> for EventPayload {
    fn from(p: OrderRequest) -> Self {
        EventPayload::OrderRequest(p)
    }
}

impl From<Fill> for EventPayload {
    fn from(p: Fill) -> Self {
        EventPayload::OrderFilled(p)
    }
}

impl From<PositionSnapshot> for EventPayload {
    fn from(p: PositionSnapshot) -> Self {
        EventPayload::PositionUpdate(p)
    }
}

impl From<Heartbeat> for EventPayload {
    fn from(p: Heartbeat) -> Self {
        EventPayload::Heartbeat(p)
    }
}

impl From<SystemErrorNotice> for EventPayload {
    fn from(p: SystemErrorNotice) -> Self {
        EventPayload::SystemError(p)
    }
}
