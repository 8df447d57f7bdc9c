//! Typed event dispatch with disposer handles.
//!
//! Handlers register per event kind or as wildcards; registration
//! returns a guard that unregisters on drop. A panicking handler is
//! caught and logged so the remaining handlers still run.

use peoplesroom_core::core_events::RoomEvent;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

/// An event handler. Shared so dispatch can run outside the registry lock.
pub type Handler = Arc<dyn Fn(&RoomEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: u64,
    by_kind: HashMap<String, Vec<(u64, Handler)>>,
    wildcard: Vec<(u64, Handler)>,
}

impl HandlerRegistry {
    pub(crate) fn register(&mut self, kind: Option<String>, handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        match kind {
            Some(kind) => self.by_kind.entry(kind).or_default().push((id, handler)),
            None => self.wildcard.push((id, handler)),
        }
        id
    }

    pub(crate) fn unregister(&mut self, kind: Option<&str>, id: u64) {
        match kind {
            Some(kind) => {
                if let Some(handlers) = self.by_kind.get_mut(kind) {
                    handlers.retain(|(hid, _)| *hid != id);
                    if handlers.is_empty() {
                        self.by_kind.remove(kind);
                    }
                }
            }
            None => self.wildcard.retain(|(hid, _)| *hid != id),
        }
    }

    /// Handlers that should see this event: kind-specific first, then wildcards
    fn matching(&self, kind: &str) -> Vec<Handler> {
        let mut handlers = Vec::new();
        if let Some(typed) = self.by_kind.get(kind) {
            handlers.extend(typed.iter().map(|(_, h)| h.clone()));
        }
        handlers.extend(self.wildcard.iter().map(|(_, h)| h.clone()));
        handlers
    }
}

/// Dispatch an event to every matching handler, isolating failures.
pub(crate) fn dispatch(registry: &Mutex<HandlerRegistry>, event: &RoomEvent) {
    let handlers = {
        let registry = registry.lock().expect("handler registry lock poisoned");
        registry.matching(event.kind())
    };

    for handler in handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            error!(kind = event.kind(), "event handler panicked");
        }
    }
}

/// Disposer handle for a registered handler; dropping it unregisters.
#[must_use = "dropping the guard immediately unregisters the handler"]
pub struct HandlerGuard {
    pub(crate) registry: Weak<Mutex<HandlerRegistry>>,
    pub(crate) kind: Option<String>,
    pub(crate) id: u64,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.unregister(self.kind.as_deref(), self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peoplesroom_core::core_room::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unlocked() -> RoomEvent {
        RoomEvent::DoorUnlocked {
            owner_id: UserId::new("alice"),
        }
    }

    #[test]
    fn test_typed_and_wildcard_dispatch() {
        let registry = Arc::new(Mutex::new(HandlerRegistry::default()));
        let typed_hits = Arc::new(AtomicUsize::new(0));
        let wild_hits = Arc::new(AtomicUsize::new(0));

        {
            let hits = typed_hits.clone();
            registry.lock().unwrap().register(
                Some("DOOR_UNLOCKED".to_string()),
                Arc::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        {
            let hits = wild_hits.clone();
            registry.lock().unwrap().register(
                None,
                Arc::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        dispatch(&registry, &unlocked());
        dispatch(
            &registry,
            &RoomEvent::SessionEnded {
                owner_id: UserId::new("alice"),
            },
        );

        assert_eq!(typed_hits.load(Ordering::SeqCst), 1);
        assert_eq!(wild_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_handler_does_not_break_fanout() {
        let registry = Arc::new(Mutex::new(HandlerRegistry::default()));
        let hits = Arc::new(AtomicUsize::new(0));

        registry
            .lock()
            .unwrap()
            .register(None, Arc::new(|_| panic!("boom")));
        {
            let hits = hits.clone();
            registry.lock().unwrap().register(
                None,
                Arc::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        dispatch(&registry, &unlocked());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_drop_unregisters() {
        let registry = Arc::new(Mutex::new(HandlerRegistry::default()));
        let hits = Arc::new(AtomicUsize::new(0));

        let id = {
            let hits = hits.clone();
            registry.lock().unwrap().register(
                None,
                Arc::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };
        let guard = HandlerGuard {
            registry: Arc::downgrade(&registry),
            kind: None,
            id,
        };

        dispatch(&registry, &unlocked());
        drop(guard);
        dispatch(&registry, &unlocked());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
