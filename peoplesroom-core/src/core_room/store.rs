//! Keyed room store with per-owner locking
//!
//! All mutable state for one owner (room settings, knock board, live
//! session) lives in a single `RoomShard` behind its own mutex: the
//! per-room serialization boundary. Operations on different rooms never
//! contend; the outer map lock is held only to look shards up.

use super::room::Room;
use super::types::{TierLabel, UserId};
use crate::core_knock::KnockBoard;
use crate::core_presence::OwnerSession;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Everything mutable about one owner's room
#[derive(Debug)]
pub struct RoomShard {
    pub room: Room,
    pub knocks: KnockBoard,
    pub session: Option<OwnerSession>,
}

impl RoomShard {
    fn new(room: Room) -> Self {
        RoomShard {
            room,
            knocks: KnockBoard::new(),
            session: None,
        }
    }

    /// Whether the owner currently has an active session
    pub fn owner_present(&self) -> bool {
        self.session.is_some()
    }
}

/// Map of per-owner shards; rooms are created lazily on first owner access
pub struct RoomStore {
    shards: RwLock<HashMap<UserId, Arc<Mutex<RoomShard>>>>,
    default_tiers: HashSet<TierLabel>,
}

impl RoomStore {
    pub fn new(default_tiers: HashSet<TierLabel>) -> Self {
        RoomStore {
            shards: RwLock::new(HashMap::new()),
            default_tiers,
        }
    }

    /// Fetch the owner's shard, creating the default room on first access.
    ///
    /// Only owner-initiated paths call this; visitor paths use
    /// [`RoomStore::shard_if_exists`] so that visiting never materializes
    /// a room on the owner's behalf.
    pub async fn shard(&self, owner_id: &UserId) -> Arc<Mutex<RoomShard>> {
        {
            let shards = self.shards.read().await;
            if let Some(shard) = shards.get(owner_id) {
                return shard.clone();
            }
        }

        let mut shards = self.shards.write().await;
        shards
            .entry(owner_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RoomShard::new(Room::new(
                    owner_id.clone(),
                    self.default_tiers.clone(),
                ))))
            })
            .clone()
    }

    /// Fetch a shard without creating one
    pub async fn shard_if_exists(&self, owner_id: &UserId) -> Option<Arc<Mutex<RoomShard>>> {
        self.shards.read().await.get(owner_id).cloned()
    }

    /// Owners with materialized rooms (snapshot, for the background sweep)
    pub async fn owners(&self) -> Vec<UserId> {
        self.shards.read().await.keys().cloned().collect()
    }
}
