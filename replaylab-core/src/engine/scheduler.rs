//! Background TICK / HEARTBEAT generator for live-paced runs.
//!
//! Intervals are in simulation seconds, so the cadence follows the clock
//! speed. The thread only publishes; it shares no other state with the run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::VirtualClock;
use crate::error::ComponentError;
use crate::event::{EventBus, Heartbeat, Tick};

/// Wall-time polling period of the scheduler thread.
const POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval: f64,
    pub heartbeat_interval: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: 1.0,
            heartbeat_interval: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub ticks_generated: u64,
    pub heartbeats_generated: u64,
}

pub struct Scheduler {
    bus: Arc<EventBus>,
    clock: Arc<VirtualClock>,
    config: SchedulerConfig,
    ticks: Arc<AtomicU64>,
    heartbeats: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub const NAME: &'static str = "Scheduler";

    pub fn new(bus: Arc<EventBus>, clock: Arc<VirtualClock>, config: SchedulerConfig) -> Self {
        Self {
            bus,
            clock,
            config,
            ticks: Arc::new(AtomicU64::new(0)),
            heartbeats: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Share a tick counter with the replayer.
    pub fn with_tick_counter(mut self, ticks: Arc<AtomicU64>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the generator thread. `Ok(false)` if already running.
    pub fn start(&self) -> Result<bool, ComponentError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler already running");
            return Ok(false);
        }
        if !(self.config.tick_interval > 0.0 && self.config.heartbeat_interval > 0.0) {
            self.running.store(false, Ordering::SeqCst);
            return Err(ComponentError::StartFailed {
                component: Self::NAME.into(),
                reason: format!(
                    "intervals must be > 0 (tick {}, heartbeat {})",
                    self.config.tick_interval, self.config.heartbeat_interval
                ),
            });
        }

        let bus = Arc::clone(&self.bus);
        let clock = Arc::clone(&self.clock);
        let ticks = Arc::clone(&self.ticks);
        let heartbeats = Arc::clone(&self.heartbeats);
        let running = Arc::clone(&self.running);
        let config = self.config;

        let spawned = thread::Builder::new()
            .name("replaylab-scheduler".into())
            .spawn(move || {
                let mut next_tick = clock.now() + config.tick_interval;
                let mut next_heartbeat = clock.now() + config.heartbeat_interval;
                while running.load(Ordering::SeqCst) {
                    let now = clock.now();
                    if now >= next_tick {
                        let tick_number = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                        bus.publish(
                            Tick {
                                tick_number,
                                sim_time: now,
                                bar_timestamp: None,
                            },
                            Self::NAME,
                        );
                        next_tick = now + config.tick_interval;
                    }
                    if now >= next_heartbeat {
                        let heartbeat_number = heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
                        bus.publish(
                            Heartbeat {
                                heartbeat_number,
                                sim_time: now,
                                ticks_generated: ticks.load(Ordering::Relaxed),
                            },
                            Self::NAME,
                        );
                        next_heartbeat = now + config.heartbeat_interval;
                    }
                    thread::sleep(POLL);
                }
            });

        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                info!(
                    tick_interval = config.tick_interval,
                    heartbeat_interval = config.heartbeat_interval,
                    "scheduler started"
                );
                Ok(true)
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(ComponentError::StartFailed {
                    component: Self::NAME.into(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Signal the thread and join it. `false` if not running.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("scheduler thread panicked");
            }
        }
        info!(stats = ?self.stats(), "scheduler stopped");
        true
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.is_running(),
            ticks_generated: self.ticks.load(Ordering::Relaxed),
            heartbeats_generated: self.heartbeats.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
