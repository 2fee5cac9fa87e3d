//! Market, fill engine and ledger wired together on a bare bus.

use std::sync::{Arc, Mutex};

use replaylab_core::domain::{Bar, OrderRequest, OrderSide, PositionSnapshot, SnapshotCause};
use replaylab_core::engine::{Lifecycle, LedgerService, MarketSimulator};
use replaylab_core::event::{BarEvent, EventBus, EventKind};
use replaylab_core::execution::FillEngine;

struct Rig {
    bus: Arc<EventBus>,
    ledger: Arc<LedgerService>,
    snapshots: Arc<Mutex<Vec<PositionSnapshot>>>,
    _lifecycles: Vec<Lifecycle>,
}

fn rig(slippage: f64) -> Rig {
    let bus = Arc::new(EventBus::new());
    let market = Arc::new(MarketSimulator::new(
        Arc::clone(&bus),
        FillEngine::new(slippage).unwrap(),
    ));
    let ledger = Arc::new(LedgerService::new(Arc::clone(&bus)));
    let lifecycles = vec![
        Lifecycle::new(market, Arc::clone(&bus)),
        Lifecycle::new(ledger.clone(), Arc::clone(&bus)),
    ];
    for l in &lifecycles {
        assert_eq!(l.start(), Ok(true));
    }

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    bus.subscribe(EventKind::PositionUpdate, "sink", move |e| {
        sink.lock().unwrap().push(e.as_position_update()?.clone());
        Ok(())
    });
    Rig {
        bus,
        ledger,
        snapshots,
        _lifecycles: lifecycles,
    }
}

fn bar(bus: &EventBus, symbol: &str, ts: f64, close: f64) {
    bus.publish(
        BarEvent {
            symbol: symbol.into(),
            bar: Bar::new(ts, close, close, close, close, 1.0),
        },
        "test",
    );
}

#[test]
fn buy_then_sell_conserves_pnl() {
    let rig = rig(0.0);
    bar(&rig.bus, "BTC/USD", 0.0, 100.0);
    rig.bus
        .publish(OrderRequest::market("BTC/USD", OrderSide::Buy, 1.0), "test");
    bar(&rig.bus, "BTC/USD", 60.0, 110.0);
    rig.bus
        .publish(OrderRequest::market("BTC/USD", OrderSide::Sell, 1.0), "test");

    let ledger = rig.ledger.ledger().unwrap();
    let pos = ledger.position("BTC/USD").unwrap();
    assert_eq!(pos.realized_pnl, 10.0);
    assert_eq!(pos.quantity, 0.0);
    assert_eq!(pos.avg_cost, 0.0);
    assert_eq!(ledger.equity(), 10.0);
}

#[test]
fn slippage_is_applied_against_the_side() {
    let rig = rig(1.0);
    bar(&rig.bus, "BTC/USD", 0.0, 100.0);
    rig.bus
        .publish(OrderRequest::market("BTC/USD", OrderSide::Buy, 1.0), "test");
    rig.bus
        .publish(OrderRequest::market("BTC/USD", OrderSide::Sell, 1.0), "test");

    let fills: Vec<PositionSnapshot> = rig
        .snapshots
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.cause == SnapshotCause::Fill)
        .cloned()
        .collect();
    assert_eq!(fills.len(), 2);
    assert!((fills[0].avg_cost - 101.0).abs() < 1e-9);
    // Sold at 99 against a 101 basis.
    assert!((fills[1].realized_pnl - (-2.0)).abs() < 1e-9);
}

#[test]
fn every_fill_and_price_update_publishes_a_snapshot() {
    let rig = rig(0.0);
    bar(&rig.bus, "BTC/USD", 0.0, 100.0);
    bar(&rig.bus, "ETH/USD", 0.0, 2_000.0);
    rig.bus
        .publish(OrderRequest::market("ETH/USD", OrderSide::Buy, 0.5), "test");
    bar(&rig.bus, "ETH/USD", 60.0, 2_100.0);

    let snapshots = rig.snapshots.lock().unwrap();
    let causes: Vec<(String, SnapshotCause)> = snapshots
        .iter()
        .map(|s| (s.symbol.clone(), s.cause))
        .collect();
    assert_eq!(
        causes,
        vec![
            ("BTC/USD".to_string(), SnapshotCause::PriceUpdate),
            ("ETH/USD".to_string(), SnapshotCause::PriceUpdate),
            ("ETH/USD".to_string(), SnapshotCause::Fill),
            ("ETH/USD".to_string(), SnapshotCause::PriceUpdate),
        ]
    );
    let last = snapshots.last().unwrap();
    assert!((last.unrealized_pnl - 50.0).abs() < 1e-9);
    assert!((last.equity - 50.0).abs() < 1e-9);
}

#[test]
fn order_before_any_bar_is_dropped_without_error() {
    let rig = rig(0.0);
    rig.bus
        .publish(OrderRequest::market("BTC/USD", OrderSide::Buy, 1.0), "test");
    assert!(rig.snapshots.lock().unwrap().is_empty());
    assert_eq!(rig.bus.handler_errors(), 0);
    assert!(rig.ledger.ledger().unwrap().position("BTC/USD").is_none());
}
