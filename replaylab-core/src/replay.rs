//! Historical bar replay paced by the virtual clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::VirtualClock;
use crate::domain::Bar;
use crate::error::ConfigError;
use crate::event::{BarEvent, EventBus, Tick};

/// Simulation seconds between bars in deterministic mode.
pub const DETERMINISTIC_STEP: f64 = 0.01;

const SOURCE: &str = "Replayer";

/// What to do with a bar whose timestamp precedes its predecessor's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonotonicityPolicy {
    /// Emit it with zero delay, log a warning, count it.
    #[default]
    Tolerate,
    /// Fail before emitting anything.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplayOptions {
    /// Publish a TICK after each BAR.
    pub emit_ticks: bool,
    /// Fixed `DETERMINISTIC_STEP` spacing instead of timestamp deltas.
    pub deterministic: bool,
    pub monotonicity: MonotonicityPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplayStats {
    pub bars_emitted: usize,
    pub ticks_emitted: usize,
    pub out_of_order: usize,
}

pub struct Replayer {
    bus: Arc<EventBus>,
    clock: Arc<VirtualClock>,
    symbol: String,
    ticks: Arc<AtomicU64>,
}

impl Replayer {
    pub fn new(bus: Arc<EventBus>, clock: Arc<VirtualClock>, symbol: impl Into<String>) -> Self {
        Self {
            bus,
            clock,
            symbol: symbol.into(),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Share a tick counter with another tick source so numbering stays global.
    pub fn with_tick_counter(mut self, ticks: Arc<AtomicU64>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn tick_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.ticks)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Emit every bar in input order, blocking until the last one is dispatched.
    pub fn replay(&self, bars: &[Bar], options: ReplayOptions) -> Result<ReplayStats, ConfigError> {
        if options.monotonicity == MonotonicityPolicy::Reject {
            check_monotonic(bars)?;
        }
        info!(
            symbol = %self.symbol,
            bars = bars.len(),
            speed = self.clock.speed(),
            deterministic = options.deterministic,
            "replay started"
        );

        let mut stats = ReplayStats::default();
        let mut prev: Option<f64> = None;
        for (index, bar) in bars.iter().enumerate() {
            if let Some(p) = prev.filter(|p| bar.timestamp < *p) {
                stats.out_of_order += 1;
                warn!(
                    index,
                    timestamp = bar.timestamp,
                    previous = p,
                    "bar out of order"
                );
            }
            let delay = match prev {
                None => 0.0,
                Some(_) if options.deterministic => DETERMINISTIC_STEP,
                Some(p) => (bar.timestamp - p).max(0.0),
            };
            self.clock.sleep(delay);

            self.bus.publish(
                BarEvent {
                    symbol: self.symbol.clone(),
                    bar: *bar,
                },
                SOURCE,
            );
            stats.bars_emitted += 1;

            if options.emit_ticks {
                let tick_number = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
                self.bus.publish(
                    Tick {
                        tick_number,
                        sim_time: self.clock.now(),
                        bar_timestamp: Some(bar.timestamp),
                    },
                    SOURCE,
                );
                stats.ticks_emitted += 1;
            }
            prev = Some(bar.timestamp);
        }

        debug!(?stats, "replay finished");
        Ok(stats)
    }
}

/// First index whose timestamp is earlier than its predecessor's, as an error.
pub fn check_monotonic(bars: &[Bar]) -> Result<(), ConfigError> {
    for (index, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(ConfigError::NonMonotonicBars {
                index: index + 1,
                timestamp: pair[1].timestamp,
                previous: pair[0].timestamp,
            });
        }
    }
    Ok(())
}
