//! Virtual clock: maps wall time onto simulation time at a speed multiplier.
//!
//! `now() = anchor_sim + speed * (wall elapsed since anchor)`. Wall time is
//! measured with a monotonic `Instant`, so system clock adjustments do not
//! make simulation time jump.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::ConfigError;

/// Speeds below this are raised to it.
pub const MIN_SPEED: f64 = 1e-4;

#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall: Instant,
    sim: f64,
    speed: f64,
}

impl Anchor {
    fn sim_at(&self, wall: Instant) -> f64 {
        self.sim + self.speed * wall.duration_since(self.wall).as_secs_f64()
    }
}

#[derive(Debug)]
pub struct VirtualClock {
    anchor: Mutex<Anchor>,
}

impl VirtualClock {
    /// Clock starting at the current wall time.
    pub fn new(speed: f64) -> Result<Self, ConfigError> {
        Self::with_start(speed, wall_epoch_seconds())
    }

    /// Clock whose simulation time starts at `sim_start` (epoch seconds).
    pub fn with_start(speed: f64, sim_start: f64) -> Result<Self, ConfigError> {
        let speed = validate_speed(speed)?;
        if !sim_start.is_finite() {
            return Err(ConfigError::InvalidField {
                field: "sim_start".into(),
                reason: format!("{sim_start} is not finite"),
            });
        }
        Ok(Self {
            anchor: Mutex::new(Anchor {
                wall: Instant::now(),
                sim: sim_start,
                speed,
            }),
        })
    }

    fn anchor(&self) -> MutexGuard<'_, Anchor> {
        self.anchor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current simulation time in epoch seconds.
    pub fn now(&self) -> f64 {
        self.anchor().sim_at(Instant::now())
    }

    pub fn speed(&self) -> f64 {
        self.anchor().speed
    }

    /// Change the multiplier. Simulation time accrued so far is kept.
    pub fn set_speed(&self, speed: f64) -> Result<(), ConfigError> {
        let speed = validate_speed(speed)?;
        let mut anchor = self.anchor();
        let wall = Instant::now();
        anchor.sim = anchor.sim_at(wall);
        anchor.wall = wall;
        anchor.speed = speed;
        debug!(speed, sim_time = anchor.sim, "clock speed changed");
        Ok(())
    }

    /// Block for `sim_seconds / speed` wall seconds. No-op for non-positive input.
    pub fn sleep(&self, sim_seconds: f64) {
        if let Some(wall) = self.wall_duration(sim_seconds) {
            thread::sleep(wall);
        }
    }

    /// Wall time `sim_seconds` of simulation time takes at the current speed.
    pub fn wall_duration(&self, sim_seconds: f64) -> Option<Duration> {
        if sim_seconds.is_nan() || sim_seconds <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(sim_seconds / self.speed()).ok()
    }
}

fn validate_speed(speed: f64) -> Result<f64, ConfigError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ConfigError::InvalidSpeed(speed));
    }
    Ok(speed.max(MIN_SPEED))
}

fn wall_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
