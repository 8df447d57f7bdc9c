//! Server-side per-room event fan-out
//!
//! One lazily-created broadcast channel per room. Publishing is
//! synchronous and happens inside the room's critical section, so
//! subscribers observe events in commit order. Delivery is
//! at-least-once while a receiver lives; a receiver that lags past the
//! buffer sees `Lagged` and must resynchronize by re-fetching room
//! state, not by replay.

use super::event::RoomEvent;
use crate::core_room::types::UserId;
use metrics::counter;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

/// Default per-room event buffer
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Per-room publish/subscribe fan-out
pub struct EventBus {
    channels: RwLock<HashMap<UserId, broadcast::Sender<RoomEvent>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        EventBus {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a room's events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, room_owner_id: &UserId) -> broadcast::Receiver<RoomEvent> {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels
            .entry(room_owner_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to the room it is scoped to.
    ///
    /// Never blocks; events for rooms with no subscribers are dropped.
    pub fn publish(&self, event: RoomEvent) {
        counter!("peoplesroom_events_published_total").increment(1);

        let channels = self.channels.read().expect("event bus lock poisoned");
        let Some(sender) = channels.get(event.room_owner()) else {
            trace!(room = %event.room_owner(), kind = event.kind(), "no subscribers, event dropped");
            return;
        };

        match sender.send(event.clone()) {
            Ok(delivered) => {
                trace!(room = %event.room_owner(), kind = event.kind(), delivered, "event published");
            }
            Err(_) => {
                // All receivers are gone; channel will be pruned later
                trace!(room = %event.room_owner(), kind = event.kind(), "no live receivers");
            }
        }
    }

    /// Drop channels whose subscribers have all disconnected
    pub fn prune(&self) {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of live subscribers for a room
    pub fn subscriber_count(&self, room_owner_id: &UserId) -> usize {
        self.channels
            .read()
            .expect("event bus lock poisoned")
            .get(room_owner_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}
