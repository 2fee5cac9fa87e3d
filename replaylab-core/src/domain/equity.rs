use serde::{Deserialize, Serialize};

/// One point of the equity curve, taken after each price update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: f64,
    pub price: f64,
    pub equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}
