//! End-to-end orchestrator runs over synthetic bars.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use replaylab_core::domain::{Bar, OrderRequest, OrderSide};
use replaylab_core::engine::{
    BacktestEngine, Component, EngineConfig, EngineState, PolicyGuard, SchedulerConfig,
};
use replaylab_core::error::{ComponentError, ConfigError, EngineError, HandlerError};
use replaylab_core::event::{Event, EventKind};
use replaylab_core::replay::{MonotonicityPolicy, ReplayOptions};
use replaylab_core::{EventPayload, RunFingerprint, Strategy, StrategyKind};

// ── Fixtures ─────────────────────────────────────────────────────────

/// Minute bars following a slow oscillation, so the trend strategy crosses both ways.
fn synthetic_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 10.0 * (t / 7.0).sin() + 0.05 * t;
            Bar::new(1_700_000_000.0 + 60.0 * t, close - 0.2, close + 0.5, close - 0.5, close, 1_000.0)
        })
        .collect()
}

fn fast_config(strategy: StrategyKind, seed: u64) -> EngineConfig {
    EngineConfig {
        speed: 1_000.0,
        seed,
        slippage_percent: 0.1,
        strategy,
        replay: ReplayOptions {
            deterministic: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn run(strategy: StrategyKind, seed: u64, bars: &[Bar]) -> (replaylab_core::BacktestReport, RunFingerprint) {
    let mut engine = BacktestEngine::new(fast_config(strategy, seed)).unwrap();
    let report = engine.run(bars).unwrap();
    let fingerprint = RunFingerprint::compute(bars, &report);
    (report, fingerprint)
}

/// Component whose handler always fails.
struct Faulty {
    calls: AtomicUsize,
}

impl Component for Faulty {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Bar, EventKind::OrderFilled]
    }

    fn handle(&self, _event: &Event) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(HandlerError::Failed("always fails".into()))
    }
}

/// Component that refuses to start.
struct Refuses;

impl Component for Refuses {
    fn name(&self) -> &str {
        "Refuses"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Bar]
    }

    fn handle(&self, _event: &Event) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_start(&self) -> Result<(), ComponentError> {
        Err(ComponentError::StartFailed {
            component: "Refuses".into(),
            reason: "missing dependency".into(),
        })
    }
}

/// Buys one unit on the first bar, sells it on the second, then goes quiet.
struct RoundTrip {
    bars_seen: usize,
}

impl Strategy for RoundTrip {
    fn name(&self) -> &str {
        "round_trip"
    }

    fn on_bar(&mut self, symbol: &str, _bar: &Bar) -> Option<OrderRequest> {
        self.bars_seen += 1;
        match self.bars_seen {
            1 => Some(OrderRequest::market(symbol, OrderSide::Buy, 1.0)),
            2 => Some(OrderRequest::market(symbol, OrderSide::Sell, 1.0)),
            _ => None,
        }
    }
}

/// Orders on every bar, alternating sides.
struct EveryBar {
    next: OrderSide,
}

impl Strategy for EveryBar {
    fn name(&self) -> &str {
        "every_bar"
    }

    fn on_bar(&mut self, symbol: &str, _bar: &Bar) -> Option<OrderRequest> {
        let side = self.next;
        self.next = match side {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        };
        Some(OrderRequest::market(symbol, side, 0.1))
    }
}

/// Halts the policy guard once a bar at or after `at` has been seen.
struct HaltAt {
    policy: Arc<PolicyGuard>,
    at: f64,
}

impl Component for HaltAt {
    fn name(&self) -> &str {
        "HaltAt"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Bar]
    }

    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        if event.as_bar()?.bar.timestamp >= self.at {
            self.policy.halt("loss limit reached");
        }
        Ok(())
    }
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn same_seed_and_bars_reproduce_the_run_exactly() {
    let bars = synthetic_bars(300);
    let (a, fa) = run(StrategyKind::Random, 1337, &bars);
    let (b, fb) = run(StrategyKind::Random, 1337, &bars);

    assert!(a.num_trades > 0);
    assert_eq!(a.num_trades, b.num_trades);
    let prices_a: Vec<f64> = a.trades.iter().map(|t| t.price).collect();
    let prices_b: Vec<f64> = b.trades.iter().map(|t| t.price).collect();
    assert_eq!(prices_a, prices_b);
    assert!((a.total_return - b.total_return).abs() <= 1e-6);
    assert_eq!(fa, fb);
}

#[test]
fn different_seeds_diverge() {
    let bars = synthetic_bars(300);
    let (_, fa) = run(StrategyKind::Random, 1, &bars);
    let (_, fb) = run(StrategyKind::Random, 2, &bars);
    assert_ne!(fa.trades_hash, fb.trades_hash);
    assert_eq!(fa.dataset_hash, fb.dataset_hash);
}

// ── Pipeline ─────────────────────────────────────────────────────────

#[test]
fn trend_run_produces_consistent_report() {
    let bars = synthetic_bars(200);
    let (report, _) = run(StrategyKind::Trend, 0, &bars);

    assert!(report.num_trades >= 2);
    assert_eq!(report.equity_curve.len(), bars.len());
    assert!(report.max_drawdown >= 0.0);
    assert!((0.0..=1.0).contains(&report.winrate));
    assert!(report
        .equity_curve
        .windows(2)
        .all(|w| w[1].timestamp >= w[0].timestamp));

    let first = report.equity_curve.first().unwrap().equity;
    let last = report.equity_curve.last().unwrap().equity;
    assert!((report.total_return - (last - first)).abs() < 1e-12);
    assert!(
        (report.final_equity - (report.final_realized_pnl + report.final_unrealized_pnl)).abs()
            < 1e-9
    );

    // Trend orders alternate BUY / SELL, starting with BUY on a rising open.
    let order_ids: Vec<&str> = report.trades.iter().map(|t| t.order_id.as_str()).collect();
    assert_eq!(order_ids[0], "ORD-000001");
    for pair in report.trades.windows(2) {
        assert_ne!(pair[0].side, pair[1].side);
    }
}

#[test]
fn lifecycle_events_and_stats() {
    let bars = synthetic_bars(50);
    let mut engine = BacktestEngine::new(EngineConfig {
        replay: ReplayOptions {
            deterministic: true,
            emit_ticks: true,
            ..Default::default()
        },
        speed: 1_000.0,
        ..Default::default()
    })
    .unwrap();

    let kinds = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::SystemBoot, EventKind::SystemShutdown] {
        let sink = Arc::clone(&kinds);
        engine.bus().subscribe(kind, "observer", move |e| {
            sink.lock().unwrap().push(e.kind());
            Ok(())
        });
    }

    assert_eq!(engine.state(), EngineState::Init);
    engine.run(&bars).unwrap();
    assert_eq!(engine.state(), EngineState::Halted);
    assert_eq!(
        *kinds.lock().unwrap(),
        vec![EventKind::SystemBoot, EventKind::SystemShutdown]
    );

    let stats = engine.stats();
    assert_eq!(stats.ticks_generated, 50);
    assert_eq!(stats.handler_errors, 0);
    assert_eq!(stats.state, EngineState::Halted);
    // Only the two observers remain subscribed after stop.
    assert_eq!(stats.subscriber_count, 2);
    assert!(stats.events_published >= 50 * 4);
    assert_eq!(engine.replay_stats().unwrap().bars_emitted, 50);
}

#[test]
fn engine_refuses_a_second_run() {
    let bars = synthetic_bars(20);
    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Trend, 0)).unwrap();
    engine.run(&bars).unwrap();
    assert!(matches!(engine.run(&bars), Err(EngineError::AlreadyRan(_))));
}

#[test]
fn fill_on_the_last_bar_reaches_the_final_figures() {
    let bars = vec![
        Bar::new(0.0, 100.0, 100.0, 100.0, 100.0, 1.0),
        Bar::new(60.0, 110.0, 110.0, 110.0, 110.0, 1.0),
    ];
    let mut config = fast_config(StrategyKind::Trend, 0);
    config.slippage_percent = 1.0;
    let mut engine =
        BacktestEngine::with_strategy(config, Box::new(RoundTrip { bars_seen: 0 })).unwrap();
    let report = engine.run(&bars).unwrap();
    let ledger = engine.ledger().unwrap();

    // BUY at 101, SELL at 108.9.
    assert_eq!(report.num_trades, 2);
    assert!((ledger.realized_pnl() - 7.9).abs() < 1e-9);
    assert_eq!(report.final_realized_pnl, ledger.realized_pnl());
    assert_eq!(report.final_unrealized_pnl, ledger.unrealized_pnl());
    assert_eq!(report.final_equity, ledger.equity());
    assert!(report.final_unrealized_pnl.abs() < 1e-9);

    // The curve still ends on the last PRICE_UPDATE sample.
    assert_eq!(report.equity_curve.len(), 2);
    assert!((report.equity_curve[1].equity - 9.0).abs() < 1e-9);
    assert!((report.total_return - 9.0).abs() < 1e-9);
}

// ── Policy guard ─────────────────────────────────────────────────────

#[test]
fn halted_policy_denies_remaining_orders() {
    let bars = synthetic_bars(20);
    let mut engine = BacktestEngine::with_strategy(
        fast_config(StrategyKind::Trend, 0),
        Box::new(EveryBar {
            next: OrderSide::Buy,
        }),
    )
    .unwrap();
    let policy = Arc::clone(engine.policy());
    engine
        .attach(Arc::new(HaltAt {
            policy,
            at: bars[4].timestamp,
        }))
        .unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    engine
        .bus()
        .subscribe(EventKind::SystemError, "observer", move |e| {
            if let EventPayload::SystemError(notice) = e.payload() {
                sink.lock().unwrap().push((e.source().to_string(), notice.stage.clone()));
            }
            Ok(())
        });

    let report = engine.run(&bars).unwrap();

    // The halt lands after bar 4's order was filled.
    assert_eq!(report.num_trades, 5);
    assert_eq!(engine.state(), EngineState::Halted);
    assert_eq!(
        *errors.lock().unwrap(),
        vec![("PolicyGuard".to_string(), "POLICY_HALT".to_string())]
    );
    let policy = engine.stats().policy;
    assert!(policy.halted);
    assert!(!policy.kill_switch_active);
    assert_eq!(policy.decisions_made, 1 + 20);
    assert_eq!(policy.denials, 15);
}

#[test]
fn kill_switch_blocks_the_run() {
    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Trend, 0)).unwrap();
    engine.policy().activate_kill_switch("desk closed");

    let err = engine.run(&synthetic_bars(10)).unwrap_err();
    assert!(matches!(err, EngineError::Startup(_)));
    assert!(err.to_string().contains("kill switch active"));
    assert_eq!(engine.state(), EngineState::Error);
    assert_eq!(engine.stats().subscriber_count, 0);
    assert_eq!(engine.stats().policy.denials, 1);
    assert_eq!(engine.replay_stats(), None);
}

// ── Failure handling ─────────────────────────────────────────────────

#[test]
fn failing_handler_does_not_stop_the_run() {
    let bars = synthetic_bars(100);
    let (baseline, baseline_fp) = run(StrategyKind::Trend, 0, &bars);

    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Trend, 0)).unwrap();
    let faulty = Arc::new(Faulty {
        calls: AtomicUsize::new(0),
    });
    engine.attach(faulty.clone()).unwrap();
    let report = engine.run(&bars).unwrap();

    assert_eq!(report.num_trades, baseline.num_trades);
    assert_eq!(RunFingerprint::compute(&bars, &report), baseline_fp);
    let calls = faulty.calls.load(Ordering::Relaxed) as u64;
    assert_eq!(calls, bars.len() as u64 + report.num_trades as u64);
    assert_eq!(engine.stats().handler_errors, calls);
}

#[test]
fn start_failure_rolls_back_and_reports_error() {
    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Trend, 0)).unwrap();
    engine.attach(Arc::new(Refuses)).unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    engine
        .bus()
        .subscribe(EventKind::SystemError, "observer", move |e| {
            sink.lock().unwrap().push(e.source().to_string());
            Ok(())
        });

    let err = engine.run(&synthetic_bars(10)).unwrap_err();
    assert!(matches!(err, EngineError::Startup(_)));
    assert_eq!(engine.state(), EngineState::Error);
    assert_eq!(errors.lock().unwrap().len(), 1);
    // Everything started before the failure was stopped again.
    assert_eq!(engine.stats().subscriber_count, 1);
    assert_eq!(engine.replay_stats(), None);
}

#[test]
fn reject_policy_fails_before_any_event() {
    let mut bars = synthetic_bars(10);
    bars.swap(3, 4);
    let mut config = fast_config(StrategyKind::Trend, 0);
    config.replay.monotonicity = MonotonicityPolicy::Reject;
    let mut engine = BacktestEngine::new(config).unwrap();

    let err = engine.run(&bars).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Config(ConfigError::NonMonotonicBars { index: 4, .. })
    ));
    assert_eq!(engine.stats().events_published, 0);
}

#[test]
fn tolerate_policy_counts_out_of_order_bars() {
    let mut bars = synthetic_bars(10);
    bars.swap(3, 4);
    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Trend, 0)).unwrap();
    let report = engine.run(&bars).unwrap();
    assert_eq!(engine.replay_stats().unwrap().out_of_order, 1);
    assert!(report
        .equity_curve
        .windows(2)
        .all(|w| w[1].timestamp >= w[0].timestamp));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let config = EngineConfig {
        speed: -1.0,
        ..Default::default()
    };
    assert_eq!(
        BacktestEngine::new(config).unwrap_err(),
        ConfigError::InvalidSpeed(-1.0)
    );
}

#[test]
fn empty_input_yields_empty_report() {
    let mut engine = BacktestEngine::new(fast_config(StrategyKind::Random, 9)).unwrap();
    let report = engine.run(&[]).unwrap();
    assert_eq!(report.num_trades, 0);
    assert!(report.equity_curve.is_empty());
    assert_eq!(report.total_return, 0.0);
}

#[test]
fn scheduler_runs_alongside_replay_when_enabled() {
    let bars: Vec<Bar> = (0..20)
        .map(|i| Bar::new(60.0 * i as f64, 1.0, 1.0, 1.0, 1.0, 0.0))
        .collect();
    let mut config = fast_config(StrategyKind::Trend, 0);
    config.speed = 6_000.0;
    config.replay.deterministic = false;
    config.scheduler = Some(SchedulerConfig {
        tick_interval: 5.0,
        heartbeat_interval: 30.0,
    });
    let mut engine = BacktestEngine::new(config).unwrap();
    let heartbeats = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&heartbeats);
    engine.bus().subscribe(EventKind::Heartbeat, "observer", move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
        Ok(())
    });

    engine.run(&bars).unwrap();
    assert!(engine.stats().ticks_generated > 0);
    assert!(heartbeats.load(Ordering::Relaxed) > 0);
}
