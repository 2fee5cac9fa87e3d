//! Component capability interface and its start/stop lifecycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::error::{ComponentError, HandlerError};
use crate::event::{Event, EventBus, EventKind, SubscriptionId};

/// Something that reacts to bus events.
///
/// Components receive their collaborators (bus, clock, shared state) at
/// construction and keep mutable state behind their own locks, so `handle`
/// takes `&self`.
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    /// Kinds to subscribe `handle` to while running.
    fn subscriptions(&self) -> Vec<EventKind>;

    fn handle(&self, event: &Event) -> Result<(), HandlerError>;

    /// Called before subscribing. An error aborts the start.
    fn on_start(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called after unsubscribing.
    fn on_stop(&self) {}
}

/// Registers a component on the bus and guards against double start/stop.
pub struct Lifecycle {
    component: Arc<dyn Component>,
    bus: Arc<EventBus>,
    /// `Some` while running.
    active: Mutex<Option<Vec<(EventKind, SubscriptionId)>>>,
}

impl Lifecycle {
    pub fn new(component: Arc<dyn Component>, bus: Arc<EventBus>) -> Self {
        Self {
            component,
            bus,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<Vec<(EventKind, SubscriptionId)>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    pub fn is_running(&self) -> bool {
        self.active().is_some()
    }

    /// Start the component. `Ok(false)` if it was already running.
    pub fn start(&self) -> Result<bool, ComponentError> {
        let mut active = self.active();
        if active.is_some() {
            warn!(component = self.name(), "already running");
            return Ok(false);
        }
        self.component.on_start()?;

        let subscriptions = self
            .component
            .subscriptions()
            .into_iter()
            .map(|kind| {
                let component = Arc::clone(&self.component);
                let id = self
                    .bus
                    .subscribe(kind, self.name(), move |event| component.handle(event));
                (kind, id)
            })
            .collect();
        *active = Some(subscriptions);
        info!(component = self.name(), "started");
        Ok(true)
    }

    /// Stop the component. `false` if it was not running.
    pub fn stop(&self) -> bool {
        let Some(subscriptions) = self.active().take() else {
            warn!(component = self.name(), "not running");
            return false;
        };
        for (kind, id) in subscriptions {
            self.bus.unsubscribe(kind, id);
        }
        self.component.on_stop();
        info!(component = self.name(), "stopped");
        true
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("component", &self.name())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Tick;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seen: AtomicUsize,
        fail_start: bool,
    }

    impl Component for Counter {
        fn name(&self) -> &str {
            "Counter"
        }

        fn subscriptions(&self) -> Vec<EventKind> {
            vec![EventKind::Tick]
        }

        fn handle(&self, _event: &Event) -> Result<(), HandlerError> {
            self.seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn on_start(&self) -> Result<(), ComponentError> {
            if self.fail_start {
                return Err(ComponentError::StartFailed {
                    component: "Counter".into(),
                    reason: "refused".into(),
                });
            }
            Ok(())
        }
    }

    fn tick() -> Tick {
        Tick {
            tick_number: 1,
            sim_time: 0.0,
            bar_timestamp: None,
        }
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
            fail_start: false,
        });
        let lifecycle = Lifecycle::new(counter.clone(), Arc::clone(&bus));

        assert_eq!(lifecycle.start(), Ok(true));
        assert_eq!(lifecycle.start(), Ok(false));
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(tick(), "test");
        assert!(lifecycle.stop());
        assert!(!lifecycle.stop());
        bus.publish(tick(), "test");

        assert_eq!(counter.seen.load(Ordering::Relaxed), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn failed_start_leaves_nothing_subscribed() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
            fail_start: true,
        });
        let lifecycle = Lifecycle::new(counter, Arc::clone(&bus));
        assert!(lifecycle.start().is_err());
        assert!(!lifecycle.is_running());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
