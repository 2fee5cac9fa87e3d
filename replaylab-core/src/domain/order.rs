//! Order requests and their enums.

use super::ids::OrderId;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Cash-flow sign of a fill on this side: +1 for SELL, -1 for BUY.
    pub fn cash_sign(self) -> f64 {
        match self {
            OrderSide::Buy => -1.0,
            OrderSide::Sell => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(DomainError::UnknownSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
}

impl FromStr for OrderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARKET" => Ok(OrderKind::Market),
            "LIMIT" => Ok(OrderKind::Limit),
            _ => Err(DomainError::UnknownOrderKind(s.to_string())),
        }
    }
}

/// A request to trade. Lives only as an ORDER_REQUEST payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: f64,
    #[serde(default)]
    pub limit_price: Option<f64>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: f64) -> Self {
        Self {
            order_id: None,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            quantity,
            limit_price: None,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: f64, price: f64) -> Self {
        Self {
            order_id: None,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit,
            quantity,
            limit_price: Some(price),
        }
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.order_id = Some(id);
        self
    }

    /// Parse the loosely-typed form an external caller submits.
    pub fn parse(
        symbol: &str,
        side: &str,
        kind: &str,
        quantity: f64,
        limit_price: Option<f64>,
    ) -> Result<Self, DomainError> {
        let request = Self {
            order_id: None,
            symbol: symbol.to_string(),
            side: side.parse()?,
            kind: kind.parse()?,
            quantity,
            limit_price,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(DomainError::InvalidQuantity(self.quantity));
        }
        Ok(())
    }
}
