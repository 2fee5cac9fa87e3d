//! Synchronous publish/subscribe bus.
//!
//! `publish` runs every handler subscribed to the event's kind on the calling
//! thread, in subscription order, before returning. The handler list is
//! snapshotted first, so handlers may publish, subscribe or unsubscribe
//! re-entrantly. A failing or panicking handler is logged and counted; the
//! remaining handlers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, trace, warn};

use super::{Event, EventKind, EventPayload};
use crate::error::HandlerError;

pub type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Returned by `subscribe`; pass back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    name: Arc<str>,
    handler: Handler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BusStats {
    pub events_published: u64,
    pub subscriber_count: usize,
    pub handler_errors: u64,
    pub event_kinds_subscribed: usize,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<EventKind, Vec<Subscriber>>>,
    next_id: AtomicU64,
    events_published: AtomicU64,
    handler_errors: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        // Handlers never run under this lock, so a poisoned table is still consistent.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `kind`. `name` identifies it in logs.
    pub fn subscribe<F>(&self, kind: EventKind, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_handler(kind, name, Arc::new(handler))
    }

    pub fn subscribe_handler(
        &self,
        kind: EventKind,
        name: impl Into<String>,
        handler: Handler,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name: Arc<str> = Arc::from(name.into());
        debug!(%kind, handler = %name, "subscribed");
        self.table()
            .entry(kind)
            .or_default()
            .push(Subscriber { id, name, handler });
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered for `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut table = self.table();
        let Some(list) = table.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|s| s.id == id) else {
            return false;
        };
        let removed = list.remove(pos);
        if list.is_empty() {
            table.remove(&kind);
        }
        debug!(%kind, handler = %removed.name, "unsubscribed");
        true
    }

    /// Build an event from `payload` and deliver it to every current subscriber
    /// of its kind. Returns the number of handlers that completed without error.
    pub fn publish(&self, payload: impl Into<EventPayload>, source: &str) -> usize {
        let event = Event::new(payload.into(), source);
        self.events_published.fetch_add(1, Ordering::Relaxed);

        if event.kind().is_critical() {
            warn!(kind = %event.kind(), source, payload = ?event.payload(), "critical event");
        } else {
            trace!(kind = %event.kind(), source, "publish");
        }

        let snapshot: Vec<Subscriber> = self
            .table()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for sub in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (sub.handler)(&event)))
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic))));
            match outcome {
                Ok(()) => delivered += 1,
                Err(err) => {
                    self.handler_errors.fetch_add(1, Ordering::Relaxed);
                    error!(
                        kind = %event.kind(),
                        source = %event.source(),
                        handler = %sub.name,
                        error = %err,
                        "event handler failed"
                    );
                }
            }
        }
        delivered
    }

    /// Total subscriptions across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.table().values().map(Vec::len).sum()
    }

    pub fn subscribers_for(&self, kind: EventKind) -> usize {
        self.table().get(&kind).map_or(0, Vec::len)
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn handler_errors(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.events_published(),
            subscriber_count: self.subscriber_count(),
            handler_errors: self.handler_errors(),
            event_kinds_subscribed: self.table().len(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("stats", &self.stats())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
