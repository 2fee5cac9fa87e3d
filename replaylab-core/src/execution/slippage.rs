//! Slippage models: compute execution cost
//!
//! Slippage is returned as a non-negative price amount. The fill engine applies
//! it against the order side.

use crate::domain::OrderRequest;
use crate::error::ConfigError;

/// Slippage model: computes cost added to (BUY) or taken from (SELL) the fill price
pub trait SlippageModel: Send + Sync {
    /// Slippage in price units for `order` executing at `reference_price`.
    fn compute(&self, order: &OrderRequest, reference_price: f64) -> f64;

    /// Name of this model
    fn name(&self) -> &str;
}

/// Percentage of the reference price. Applies to market and limit orders alike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentSlippage {
    percent: f64,
}

impl PercentSlippage {
    pub fn new(percent: f64) -> Result<Self, ConfigError> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(ConfigError::InvalidSlippage(percent));
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}

impl SlippageModel for PercentSlippage {
    fn compute(&self, _order: &OrderRequest, reference_price: f64) -> f64 {
        reference_price * self.percent / 100.0
    }

    fn name(&self) -> &str {
        "PercentSlippage"
    }
}
