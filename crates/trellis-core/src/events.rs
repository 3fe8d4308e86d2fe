//! Store change notifications.
//!
//! Consumers (view layers, derived-index caches) subscribe to find out
//! when the mirrored collections changed, then pull fresh snapshots. The
//! bus never carries the data itself, only the fact that a table moved.

use crate::model::Table;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Which mutation a failure notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Create,
    Update,
    Remove,
    Move,
}

/// Events emitted by the workspace as the mirror changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// A collection changed (optimistic write, reconciled write, or a
    /// realtime event). Pull a fresh snapshot and rebuild derived views.
    CollectionChanged { table: Table },
    /// A mutation failed to persist. Local state has already been rolled
    /// back or resynced by the time this fires.
    MutationFailed {
        table: Table,
        mutation: MutationKind,
    },
    /// The whole mirror was replaced from the remote store.
    ResyncCompleted {
        folders: usize,
        tasks: usize,
        goals: usize,
        schedule: usize,
    },
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Event bus for publishing store events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Arc<dyn Fn(StoreEvent) + Send + Sync>)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    ///
    /// Requires `self` to be wrapped in `Arc`.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(StoreEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // Use try_write to avoid deadlock if Drop runs during panic
        // unwinding while a read lock is held (e.g., during emit).
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: StoreEvent) {
        // Clone the callback list to prevent deadlock if a callback calls
        // subscribe.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscribe_and_emit() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let _sub = bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(StoreEvent::CollectionChanged {
            table: Table::Tasks,
        });

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn subscription_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        {
            let _sub = bus.subscribe(move |_event| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            });
            bus.emit(StoreEvent::CollectionChanged {
                table: Table::Folders,
            });
            assert_eq!(count.load(Ordering::Relaxed), 1);
        }

        bus.emit(StoreEvent::CollectionChanged {
            table: Table::Folders,
        });
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn multiple_subscribers_all_fire() {
        let bus = Arc::new(EventBus::new());
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count1);
        let c2 = Arc::clone(&count2);
        let _sub1 = bus.subscribe(move |_| {
            c1.fetch_add(1, Ordering::Relaxed);
        });
        let _sub2 = bus.subscribe(move |_| {
            c2.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(StoreEvent::ResyncCompleted {
            folders: 0,
            tasks: 0,
            goals: 0,
            schedule: 0,
        });

        assert_eq!(count1.load(Ordering::Relaxed), 1);
        assert_eq!(count2.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn store_event_serialization_shape() {
        let event = StoreEvent::MutationFailed {
            table: Table::Schedule,
            mutation: MutationKind::Remove,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"mutationFailed\""));
        assert!(json.contains("\"table\":\"schedule\""));
        assert!(json.contains("\"mutation\":\"remove\""));
    }
}
