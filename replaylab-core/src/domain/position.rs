use serde::{Deserialize, Serialize};

/// Per-symbol position state, owned by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub last_price: f64,
    /// PnL realized on this symbol so far.
    pub realized_pnl: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0.0,
            avg_cost: 0.0,
            last_price: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.last_price
    }

    /// Mark-to-market PnL at `last_price`.
    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity * (self.last_price - self.avg_cost)
    }
}

/// What made the ledger publish a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotCause {
    Fill,
    PriceUpdate,
}

/// POSITION_UPDATE payload: full state of one symbol plus ledger totals.
///
/// Enough to rebuild equity without replaying history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub last_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
    pub equity: f64,
    /// Bar time of the fill or price update (UTC epoch seconds).
    pub timestamp: f64,
    pub cause: SnapshotCause,
}
