use serde::{Deserialize, Serialize};
use std::fmt;

/// Every event kind the bus routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Bar,
    Tick,
    PriceUpdate,
    OrderRequest,
    OrderFilled,
    PositionUpdate,
    Heartbeat,
    SystemBoot,
    SystemShutdown,
    SystemError,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Bar,
        EventKind::Tick,
        EventKind::PriceUpdate,
        EventKind::OrderRequest,
        EventKind::OrderFilled,
        EventKind::PositionUpdate,
        EventKind::Heartbeat,
        EventKind::SystemBoot,
        EventKind::SystemShutdown,
        EventKind::SystemError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Bar => "BAR",
            EventKind::Tick => "TICK",
            EventKind::PriceUpdate => "PRICE_UPDATE",
            EventKind::OrderRequest => "ORDER_REQUEST",
            EventKind::OrderFilled => "ORDER_FILLED",
            EventKind::PositionUpdate => "POSITION_UPDATE",
            EventKind::Heartbeat => "HEARTBEAT",
            EventKind::SystemBoot => "SYSTEM_BOOT",
            EventKind::SystemShutdown => "SYSTEM_SHUTDOWN",
            EventKind::SystemError => "SYSTEM_ERROR",
        }
    }

    /// Kinds that are logged at warning level when published.
    pub fn is_critical(self) -> bool {
        matches!(self, EventKind::SystemError)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
