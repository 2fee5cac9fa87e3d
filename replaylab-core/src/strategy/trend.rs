//! Moving average crossover: buy when the fast SMA is above the slow one,
//! sell when it is below. Each direction fires once until the other fires.

use std::collections::VecDeque;

use super::{Signal, Strategy, DEFAULT_QUANTITY};
use crate::domain::{Bar, OrderRequest, OrderSide};
use crate::error::ConfigError;

/// Last `period` closes.
#[derive(Debug, Clone)]
struct SmaWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl SmaWindow {
    fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period),
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.period {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean once the window is full.
    fn mean(&self) -> Option<f64> {
        (self.values.len() == self.period)
            .then(|| self.values.iter().sum::<f64>() / self.period as f64)
    }
}

#[derive(Debug, Clone)]
pub struct TrendFollower {
    fast: SmaWindow,
    slow: SmaWindow,
    quantity: f64,
    last_signal: Option<Signal>,
}

impl TrendFollower {
    pub const FAST: usize = 3;
    pub const SLOW: usize = 8;

    pub fn new(fast: usize, slow: usize, quantity: f64) -> Result<Self, ConfigError> {
        if fast == 0 || slow <= fast {
            return Err(ConfigError::InvalidField {
                field: "trend periods".into(),
                reason: format!("need 0 < fast < slow, got fast={fast} slow={slow}"),
            });
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ConfigError::InvalidField {
                field: "quantity".into(),
                reason: format!("{quantity} must be finite and > 0"),
            });
        }
        Ok(Self {
            fast: SmaWindow::new(fast),
            slow: SmaWindow::new(slow),
            quantity,
            last_signal: None,
        })
    }

    pub fn last_signal(&self) -> Option<Signal> {
        self.last_signal
    }
}

impl Default for TrendFollower {
    fn default() -> Self {
        Self {
            fast: SmaWindow::new(Self::FAST),
            slow: SmaWindow::new(Self::SLOW),
            quantity: DEFAULT_QUANTITY,
            last_signal: None,
        }
    }
}

impl Strategy for TrendFollower {
    fn name(&self) -> &str {
        "fake_trend"
    }

    fn on_bar(&mut self, symbol: &str, bar: &Bar) -> Option<OrderRequest> {
        self.fast.push(bar.close);
        self.slow.push(bar.close);
        let (fast, slow) = (self.fast.mean()?, self.slow.mean()?);

        let signal = if fast > slow {
            Signal::Long
        } else if fast < slow {
            Signal::Short
        } else {
            return None;
        };
        if self.last_signal == Some(signal) {
            return None;
        }
        self.last_signal = Some(signal);
        let side = match signal {
            Signal::Long => OrderSide::Buy,
            Signal::Short => OrderSide::Sell,
        };
        Some(OrderRequest::market(symbol, side, self.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(strategy: &mut TrendFollower, closes: &[f64]) -> Vec<Option<OrderSide>> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                strategy
                    .on_bar("BTC/USD", &Bar::new(i as f64, c, c, c, c, 0.0))
                    .map(|o| o.side)
            })
            .collect()
    }

    #[test]
    fn test_silent_during_warmup() {
        let mut strategy = TrendFollower::default();
        let out = feed(&mut strategy, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn test_rising_then_falling_signals_once_each_way() {
        let mut strategy = TrendFollower::default();
        let mut closes: Vec<f64> = (1..=10).map(f64::from).collect();
        closes.extend((1..=10).rev().map(f64::from));
        let sides: Vec<OrderSide> = feed(&mut strategy, &closes).into_iter().flatten().collect();
        assert_eq!(sides, vec![OrderSide::Buy, OrderSide::Sell]);
        assert_eq!(strategy.last_signal(), Some(Signal::Short));
    }

    #[test]
    fn test_flat_prices_never_trade() {
        let mut strategy = TrendFollower::default();
        let out = feed(&mut strategy, &[5.0; 20]);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn test_orders_use_bar_symbol_and_quantity() {
        let mut strategy = TrendFollower::default();
        let mut order = None;
        for i in 0..8 {
            let c = 100.0 + i as f64;
            order = strategy.on_bar("ETH/USD", &Bar::new(i as f64, c, c, c, c, 0.0));
        }
        let order = order.unwrap();
        assert_eq!(order.symbol, "ETH/USD");
        assert_eq!(order.quantity, DEFAULT_QUANTITY);
        assert_eq!(order.limit_price, None);
    }

    #[test]
    fn test_rejects_bad_periods() {
        assert!(TrendFollower::new(0, 8, 0.1).is_err());
        assert!(TrendFollower::new(8, 3, 0.1).is_err());
        assert!(TrendFollower::new(3, 8, 0.0).is_err());
    }
}
