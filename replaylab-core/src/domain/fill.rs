use crate::domain::ids::OrderId;
use crate::domain::order::OrderSide;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillStatus {
    Filled,
}

impl FillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FillStatus::Filled => "FILLED",
        }
    }
}

/// Fill record. One per accepted order request; never partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub status: FillStatus,
    /// Timestamp of the reference bar (UTC epoch seconds).
    pub timestamp: f64,
}

impl Fill {
    /// Signed cash flow of the fill: `+quantity * price` for SELL, `-quantity * price` for BUY.
    pub fn signed_value(&self) -> f64 {
        self.side.cash_sign() * self.quantity * self.price
    }
}
