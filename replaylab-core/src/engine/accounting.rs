//! Position ledger and the component that keeps it current.
//!
//! `Ledger` is a plain state machine over fills and price updates.
//! `LedgerService` feeds it from the bus and publishes a POSITION_UPDATE
//! snapshot after every change.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::Component;
use crate::domain::{Fill, OrderSide, Position, PositionSnapshot, SnapshotCause};
use crate::error::HandlerError;
use crate::event::{Event, EventBus, EventKind, EventPayload};

/// Quantities within this of zero are treated as flat.
pub const FLAT_EPSILON: f64 = 1e-12;

/// Per-symbol positions plus realized PnL.
///
/// `BTreeMap` keeps aggregate sums in a stable order across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    positions: BTreeMap<String, Position>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, symbol: &str) -> &mut Position {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol))
    }

    /// Apply a fill: BUY averages into the cost basis, SELL realizes against it.
    pub fn apply_fill(&mut self, fill: &Fill) -> &Position {
        let pos = self.entry(&fill.symbol);
        let (q, p) = (fill.quantity, fill.price);
        match fill.side {
            OrderSide::Buy => {
                let new_qty = pos.quantity + q;
                pos.avg_cost = if new_qty != 0.0 {
                    (pos.avg_cost * pos.quantity + p * q) / new_qty
                } else {
                    0.0
                };
                pos.quantity = new_qty;
            }
            OrderSide::Sell => {
                pos.realized_pnl += (p - pos.avg_cost) * q;
                pos.quantity -= q;
            }
        }
        if pos.quantity.abs() < FLAT_EPSILON {
            pos.quantity = 0.0;
            pos.avg_cost = 0.0;
        }
        // Never priced yet: mark at the fill so unrealized PnL starts from zero.
        if pos.last_price == 0.0 {
            pos.last_price = p;
        }
        pos
    }

    /// Mark a symbol to `price`. Realized PnL is untouched.
    pub fn update_price(&mut self, symbol: &str, price: f64) -> &Position {
        let pos = self.entry(symbol);
        pos.last_price = price;
        pos
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    pub fn equity(&self) -> f64 {
        self.realized_pnl() + self.unrealized_pnl()
    }

    /// Current state of `symbol` plus ledger totals.
    pub fn snapshot(
        &self,
        symbol: &str,
        timestamp: f64,
        cause: SnapshotCause,
    ) -> Option<PositionSnapshot> {
        let pos = self.positions.get(symbol)?;
        let total_realized_pnl = self.realized_pnl();
        let total_unrealized_pnl = self.unrealized_pnl();
        Some(PositionSnapshot {
            symbol: pos.symbol.clone(),
            quantity: pos.quantity,
            avg_cost: pos.avg_cost,
            last_price: pos.last_price,
            realized_pnl: pos.realized_pnl,
            unrealized_pnl: pos.unrealized_pnl(),
            total_realized_pnl,
            total_unrealized_pnl,
            equity: total_realized_pnl + total_unrealized_pnl,
            timestamp,
            cause,
        })
    }
}

/// Bus-facing owner of the ledger.
pub struct LedgerService {
    bus: Arc<EventBus>,
    ledger: Mutex<Ledger>,
}

impl LedgerService {
    pub const NAME: &'static str = "Ledger";

    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            ledger: Mutex::new(Ledger::new()),
        }
    }

    /// Copy of the current ledger.
    pub fn ledger(&self) -> Result<Ledger, HandlerError> {
        self.ledger
            .lock()
            .map(|l| l.clone())
            .map_err(|_| HandlerError::Poisoned(Self::NAME.into()))
    }

    fn update<F>(&self, symbol: &str, timestamp: f64, cause: SnapshotCause, f: F) -> Result<(), HandlerError>
    where
        F: FnOnce(&mut Ledger),
    {
        let snapshot = {
            let mut ledger = self
                .ledger
                .lock()
                .map_err(|_| HandlerError::Poisoned(Self::NAME.into()))?;
            f(&mut ledger);
            ledger.snapshot(symbol, timestamp, cause)
        };
        // Lock released: subscribers may read the ledger.
        if let Some(snapshot) = snapshot {
            self.bus
                .publish(EventPayload::PositionUpdate(snapshot), Self::NAME);
        }
        Ok(())
    }
}

impl Component for LedgerService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::OrderFilled, EventKind::PriceUpdate]
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match event.kind() {
            EventKind::OrderFilled => {
                let fill = event.as_fill()?;
                debug!(
                    order_id = %fill.order_id,
                    symbol = %fill.symbol,
                    side = %fill.side,
                    quantity = fill.quantity,
                    price = fill.price,
                    "applying fill"
                );
                self.update(&fill.symbol, fill.timestamp, SnapshotCause::Fill, |l| {
                    l.apply_fill(fill);
                })
            }
            EventKind::PriceUpdate => {
                let update = event.as_price_update()?;
                self.update(
                    &update.symbol,
                    update.timestamp,
                    SnapshotCause::PriceUpdate,
                    |l| {
                        l.update_price(&update.symbol, update.price);
                    },
                )
            }
            other => Err(HandlerError::UnexpectedPayload {
                expected: EventKind::OrderFilled,
                actual: other,
            }),
        }
    }
}
