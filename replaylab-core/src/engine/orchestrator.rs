//! Backtest orchestrator: wires bus, clock, replayer and components into one run.
//!
//! Run sequence:
//! 1. Ask the policy guard for permission to start
//! 2. Start components in order: market, ledger, recorder, strategy, extras
//! 3. Publish SYSTEM_BOOT
//! 4. Replay every bar (blocking)
//! 5. Stop components in reverse order, publish SYSTEM_SHUTDOWN
//! 6. Assemble the report from the recorder, closing PnL from the ledger

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use super::accounting::{Ledger, LedgerService};
use super::component::{Component, Lifecycle};
use super::market::MarketSimulator;
use super::policy::PolicyGuard;
use super::recorder::Recorder;
use super::scheduler::Scheduler;
use super::state::{EngineConfig, EngineState, EngineStats};
use crate::clock::VirtualClock;
use crate::domain::Bar;
use crate::error::{ComponentError, ConfigError, EngineError};
use crate::event::{EventBus, EventPayload};
use crate::execution::FillEngine;
use crate::replay::{check_monotonic, MonotonicityPolicy, ReplayStats, Replayer};
use crate::report::BacktestReport;
use crate::rng::RngHierarchy;
use crate::strategy::{Strategy, StrategyHost};

const SOURCE: &str = "BacktestEngine";

pub struct BacktestEngine {
    config: EngineConfig,
    bus: Arc<EventBus>,
    clock: Option<Arc<VirtualClock>>,
    ledger: Arc<LedgerService>,
    recorder: Arc<Recorder>,
    policy: Arc<PolicyGuard>,
    /// Start order; stopped in reverse.
    lifecycles: Vec<Lifecycle>,
    ticks: Arc<AtomicU64>,
    state: EngineState,
    replay_stats: Option<ReplayStats>,
}

impl BacktestEngine {
    /// Engine running the strategy named in `config`.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let strategy = config.strategy.build(&RngHierarchy::new(config.seed));
        Self::with_strategy(config, strategy)
    }

    /// Engine running a caller-supplied strategy.
    pub fn with_strategy(
        config: EngineConfig,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = Arc::new(EventBus::new());

        let policy = Arc::new(PolicyGuard::new(Arc::clone(&bus)));
        let market = Arc::new(
            MarketSimulator::new(Arc::clone(&bus), FillEngine::new(config.slippage_percent)?)
                .with_policy(Arc::clone(&policy)),
        );
        let ledger = Arc::new(LedgerService::new(Arc::clone(&bus)));
        let recorder = Arc::new(Recorder::new());
        let host = Arc::new(StrategyHost::new(Arc::clone(&bus), strategy));

        let components: [Arc<dyn Component>; 4] =
            [market, ledger.clone(), recorder.clone(), host];
        let lifecycles = components
            .into_iter()
            .map(|c| Lifecycle::new(c, Arc::clone(&bus)))
            .collect();

        Ok(Self {
            config,
            bus,
            clock: None,
            ledger,
            recorder,
            policy,
            lifecycles,
            ticks: Arc::new(AtomicU64::new(0)),
            state: EngineState::Init,
            replay_stats: None,
        })
    }

    /// Add a component started after the built-in ones. Only before `run`.
    pub fn attach(&mut self, component: Arc<dyn Component>) -> Result<(), EngineError> {
        if self.state != EngineState::Init {
            return Err(EngineError::AlreadyRan(self.state.to_string()));
        }
        self.lifecycles
            .push(Lifecycle::new(component, Arc::clone(&self.bus)));
        Ok(())
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Risk gate in front of order execution. Halt or kill the run through it.
    pub fn policy(&self) -> &Arc<PolicyGuard> {
        &self.policy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The run's clock, once `run` has started.
    pub fn clock(&self) -> Option<&Arc<VirtualClock>> {
        self.clock.as_ref()
    }

    pub fn replay_stats(&self) -> Option<ReplayStats> {
        self.replay_stats
    }

    /// Snapshot of the ledger.
    pub fn ledger(&self) -> Result<Ledger, EngineError> {
        self.ledger.ledger().map_err(|_| EngineError::Poisoned)
    }

    pub fn stats(&self) -> EngineStats {
        let bus = self.bus.stats();
        EngineStats {
            events_published: bus.events_published,
            subscriber_count: bus.subscriber_count,
            ticks_generated: self.ticks.load(Ordering::Relaxed),
            handler_errors: bus.handler_errors,
            state: self.state,
            policy: self.policy.stats(),
        }
    }

    /// Replay `bars` through the full pipeline and return the report.
    ///
    /// An engine runs once; build a new one for another run.
    pub fn run(&mut self, bars: &[Bar]) -> Result<BacktestReport, EngineError> {
        if self.state != EngineState::Init {
            return Err(EngineError::AlreadyRan(self.state.to_string()));
        }
        if self.config.replay.monotonicity == MonotonicityPolicy::Reject {
            if let Err(err) = check_monotonic(bars) {
                self.state = EngineState::Error;
                return Err(err.into());
            }
        }

        let sim_start = self
            .config
            .sim_start
            .or_else(|| bars.first().map(|b| b.timestamp));
        let clock = Arc::new(match sim_start {
            Some(start) => VirtualClock::with_start(self.config.speed, start)?,
            None => VirtualClock::new(self.config.speed)?,
        });
        self.clock = Some(Arc::clone(&clock));

        self.state = EngineState::Booting;
        info!(
            symbol = %self.config.symbol,
            strategy = %self.config.strategy,
            speed = self.config.speed,
            seed = self.config.seed,
            bars = bars.len(),
            "booting"
        );
        let decision = self.policy.check_system_start();
        if !decision.allowed {
            return Err(self.fail_startup(ComponentError::StartFailed {
                component: PolicyGuard::NAME.into(),
                reason: decision.reason,
            }));
        }
        if let Err(err) = self.start_components() {
            return Err(self.fail_startup(err));
        }

        let scheduler = match self.config.scheduler {
            Some(cfg) => {
                let scheduler =
                    Scheduler::new(Arc::clone(&self.bus), Arc::clone(&clock), cfg)
                        .with_tick_counter(Arc::clone(&self.ticks));
                if let Err(err) = scheduler.start() {
                    self.stop_components();
                    return Err(self.fail_startup(err));
                }
                Some(scheduler)
            }
            None => None,
        };

        self.bus
            .publish(EventPayload::boot("backtest started"), SOURCE);
        self.state = EngineState::Running;

        let replayer = Replayer::new(Arc::clone(&self.bus), clock, self.config.symbol.clone())
            .with_tick_counter(Arc::clone(&self.ticks));
        let replayed = replayer.replay(bars, self.config.replay);

        if let Some(scheduler) = &scheduler {
            scheduler.stop();
        }
        self.stop_components();

        let stats = match replayed {
            Ok(stats) => stats,
            Err(err) => {
                self.bus
                    .publish(EventPayload::error("REPLAY_FAILED", err.to_string()), SOURCE);
                self.state = EngineState::Error;
                return Err(err.into());
            }
        };
        self.replay_stats = Some(stats);
        self.bus
            .publish(EventPayload::shutdown("backtest finished"), SOURCE);
        self.state = EngineState::Halted;

        let recording = self
            .recorder
            .recording()
            .map_err(|_| EngineError::Poisoned)?;
        let ledger = self.ledger()?;
        let report = BacktestReport::compute(recording.trades, recording.equity_curve)
            .settle(ledger.realized_pnl(), ledger.unrealized_pnl());
        info!(
            bars = stats.bars_emitted,
            out_of_order = stats.out_of_order,
            trades = report.num_trades,
            total_return = report.total_return,
            max_drawdown = report.max_drawdown,
            final_equity = report.final_equity,
            handler_errors = self.bus.handler_errors(),
            "backtest finished"
        );
        Ok(report)
    }

    /// Start in order. On failure, stop what already started (reverse order).
    fn start_components(&self) -> Result<(), ComponentError> {
        for (index, lifecycle) in self.lifecycles.iter().enumerate() {
            if let Err(err) = lifecycle.start() {
                for started in self.lifecycles[..index].iter().rev() {
                    started.stop();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn stop_components(&self) {
        for lifecycle in self.lifecycles.iter().rev() {
            lifecycle.stop();
        }
    }

    fn fail_startup(&mut self, err: ComponentError) -> EngineError {
        error!(error = %err, "startup halted");
        self.bus
            .publish(EventPayload::error("BOOT_FAILED", err.to_string()), SOURCE);
        self.state = EngineState::Error;
        EngineError::Startup(err)
    }
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("components", &self.lifecycles)
            .finish()
    }
}
