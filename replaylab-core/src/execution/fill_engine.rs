//! Fill engine: converts an order request plus its reference bar into a fill.
//!
//! Deterministic: the same request against the same bar yields the same price,
//! and ids come from a per-engine counter.

use super::{PercentSlippage, SlippageModel};
use crate::domain::{Bar, Fill, FillStatus, IdGen, OrderRequest, OrderSide};
use crate::error::ConfigError;

pub struct FillEngine {
    slippage_model: Box<dyn SlippageModel>,
    ids: IdGen,
}

impl FillEngine {
    /// Engine with percentage slippage, the model used by backtests.
    pub fn new(slippage_percent: f64) -> Result<Self, ConfigError> {
        Ok(Self::with_model(Box::new(PercentSlippage::new(
            slippage_percent,
        )?)))
    }

    pub fn with_model(slippage_model: Box<dyn SlippageModel>) -> Self {
        Self {
            slippage_model,
            ids: IdGen::new(),
        }
    }

    /// Price before slippage: the limit price when present, else the bar close.
    pub fn reference_price(order: &OrderRequest, reference: &Bar) -> f64 {
        order.limit_price.unwrap_or(reference.close)
    }

    /// Execute `order` in full against `reference`.
    pub fn fill(&mut self, order: &OrderRequest, reference: &Bar) -> Fill {
        let price = Self::reference_price(order, reference);
        let slip = self.slippage_model.compute(order, price);
        let fill_price = match order.side {
            OrderSide::Buy => price + slip,
            OrderSide::Sell => price - slip,
        };
        let order_id = match &order.order_id {
            Some(id) => id.clone(),
            None => self.ids.next_order_id(),
        };
        Fill {
            order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: fill_price,
            status: FillStatus::Filled,
            timestamp: reference.timestamp,
        }
    }

    /// Ids generated so far (requests carrying their own id are not counted).
    pub fn ids_issued(&self) -> u64 {
        self.ids.issued()
    }

    pub fn slippage_model(&self) -> &dyn SlippageModel {
        self.slippage_model.as_ref()
    }
}

impl std::fmt::Debug for FillEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillEngine")
            .field("slippage_model", &self.slippage_model.name())
            .field("ids_issued", &self.ids.issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;

    fn reference(close: f64) -> Bar {
        Bar::new(1_700_000_000.0, close, close, close, close, 0.0)
    }

    #[test]
    fn test_buy_pays_slippage_sell_receives_less() {
        let mut engine = FillEngine::new(1.0).unwrap();
        let bar = reference(100.0);

        let buy = engine.fill(&OrderRequest::market("BTC/USD", OrderSide::Buy, 1.0), &bar);
        assert!((buy.price - 101.0).abs() < 1e-9);

        let sell = engine.fill(&OrderRequest::market("BTC/USD", OrderSide::Sell, 1.0), &bar);
        assert!((sell.price - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_limit_price_overrides_close() {
        let mut engine = FillEngine::new(0.0).unwrap();
        let fill = engine.fill(
            &OrderRequest::limit("BTC/USD", OrderSide::Buy, 2.0, 95.0),
            &reference(100.0),
        );
        assert_eq!(fill.price, 95.0);
        assert_eq!(fill.quantity, 2.0);
        assert_eq!(fill.status, FillStatus::Filled);
        assert_eq!(fill.timestamp, 1_700_000_000.0);
    }

    #[test]
    fn test_ids_are_sequential_unless_supplied() {
        let mut engine = FillEngine::new(0.0).unwrap();
        let bar = reference(10.0);
        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, 1.0);

        assert_eq!(engine.fill(&order, &bar).order_id.as_str(), "ORD-000001");
        let own = order.clone().with_id(OrderId::new("client-7"));
        assert_eq!(engine.fill(&own, &bar).order_id.as_str(), "client-7");
        assert_eq!(engine.fill(&order, &bar).order_id.as_str(), "ORD-000002");
        assert_eq!(engine.ids_issued(), 2);
    }

    #[test]
    fn test_rejects_invalid_slippage() {
        assert!(FillEngine::new(-1.0).is_err());
        assert!(FillEngine::new(f64::NAN).is_err());
    }
}
