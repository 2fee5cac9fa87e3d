//! Risk gate: every run start and order submission is checked here.
//!
//! The guard holds two switches. The kill switch blocks starts and orders
//! until it is cleared by hand. A halt blocks orders for the rest of the run
//! and announces itself with SYSTEM_ERROR.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::OrderRequest;
use crate::event::{EventBus, EventPayload};

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
}

impl PolicyDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

/// Counters reported through `EngineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    pub kill_switch_active: bool,
    pub halted: bool,
    pub decisions_made: u64,
    pub denials: u64,
}

impl PolicyStats {
    /// Denials over decisions; 0.0 before the first decision.
    pub fn denial_rate(&self) -> f64 {
        self.denials as f64 / self.decisions_made.max(1) as f64
    }
}

pub struct PolicyGuard {
    bus: Arc<EventBus>,
    kill_switch: AtomicBool,
    halted: AtomicBool,
    decisions_made: AtomicU64,
    denials: AtomicU64,
}

impl PolicyGuard {
    pub const NAME: &'static str = "PolicyGuard";

    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            kill_switch: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            decisions_made: AtomicU64::new(0),
            denials: AtomicU64::new(0),
        }
    }

    fn decide(&self, decision: PolicyDecision) -> PolicyDecision {
        self.decisions_made.fetch_add(1, Ordering::Relaxed);
        if !decision.allowed {
            self.denials.fetch_add(1, Ordering::Relaxed);
        }
        decision
    }

    pub fn check_system_start(&self) -> PolicyDecision {
        if self.kill_switch_active() {
            warn!("run start denied: kill switch active");
            return self.decide(PolicyDecision::deny("kill switch active"));
        }
        self.decide(PolicyDecision::allow("start permitted"))
    }

    pub fn check_order(&self, order: &OrderRequest) -> PolicyDecision {
        let denied = if self.kill_switch_active() {
            Some("kill switch active")
        } else if self.is_halted() {
            Some("system halted")
        } else {
            None
        };
        match denied {
            Some(reason) => {
                warn!(symbol = %order.symbol, side = %order.side, reason, "order denied");
                self.decide(PolicyDecision::deny(reason))
            }
            None => {
                debug!(symbol = %order.symbol, side = %order.side, "order allowed");
                self.decide(PolicyDecision::allow("order permitted"))
            }
        }
    }

    /// Block starts and orders, and halt the current run.
    pub fn activate_kill_switch(&self, reason: &str) {
        error!(reason, "kill switch activated");
        self.kill_switch.store(true, Ordering::SeqCst);
        self.halted.store(true, Ordering::SeqCst);
        self.bus
            .publish(EventPayload::error("KILL_SWITCH", reason), Self::NAME);
    }

    /// Clears both the kill switch and any halt.
    pub fn deactivate_kill_switch(&self) {
        warn!("kill switch deactivated");
        self.kill_switch.store(false, Ordering::SeqCst);
        self.halted.store(false, Ordering::SeqCst);
    }

    /// Deny every further order. Publishes SYSTEM_ERROR once per halt.
    pub fn halt(&self, reason: &str) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        error!(reason, "system halted");
        self.bus
            .publish(EventPayload::error("POLICY_HALT", reason), Self::NAME);
    }

    pub fn kill_switch_active(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PolicyStats {
        PolicyStats {
            kill_switch_active: self.kill_switch_active(),
            halted: self.is_halted(),
            decisions_made: self.decisions_made.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for PolicyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGuard")
            .field("stats", &self.stats())
            .finish()
    }
}
