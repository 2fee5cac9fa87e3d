//! Seeded coin-flip trader for exercising the order path.

use rand::rngs::StdRng;
use rand::Rng;

use super::{Strategy, DEFAULT_QUANTITY};
use crate::domain::{Bar, OrderRequest, OrderSide};
use crate::rng::RngHierarchy;

const BUY_BELOW: f64 = 0.33;
const SELL_BELOW: f64 = 0.66;

/// Per bar: buy with probability 0.33, sell with 0.33, otherwise nothing.
#[derive(Debug, Clone)]
pub struct RandomTrader {
    rng: StdRng,
    quantity: f64,
}

impl RandomTrader {
    pub const RNG_STREAM: &'static str = "RandomTrader";

    pub fn new(rngs: &RngHierarchy) -> Self {
        Self::with_quantity(rngs, DEFAULT_QUANTITY)
    }

    pub fn with_quantity(rngs: &RngHierarchy, quantity: f64) -> Self {
        Self {
            rng: rngs.rng_for(Self::RNG_STREAM, 0),
            quantity,
        }
    }
}

impl Strategy for RandomTrader {
    fn name(&self) -> &str {
        "fake_random"
    }

    fn on_bar(&mut self, symbol: &str, _bar: &Bar) -> Option<OrderRequest> {
        let r: f64 = self.rng.gen();
        let side = if r < BUY_BELOW {
            OrderSide::Buy
        } else if r < SELL_BELOW {
            OrderSide::Sell
        } else {
            return None;
        };
        Some(OrderRequest::market(symbol, side, self.quantity))
    }
}
