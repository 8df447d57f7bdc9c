//! Owner sessions and the live visitor set

use crate::core_room::types::{Timestamp, TierLabel, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A visitor currently inside a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
    pub user_id: UserId,
    pub tier: TierLabel,
    pub joined_at: Timestamp,
}

/// One occupancy period for an owner's room.
///
/// Existence of the session means the owner is "in"; an owner has at
/// most one, enforced structurally (`Option<OwnerSession>` in the shard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSession {
    /// When the owner entered
    pub started_at: Timestamp,

    /// Visitors currently inside, unique by user
    pub visitors: HashMap<UserId, Visitor>,
}

impl OwnerSession {
    pub fn new(started_at: Timestamp) -> Self {
        OwnerSession {
            started_at,
            visitors: HashMap::new(),
        }
    }

    /// Add a visitor. Rejects duplicate entry by the same user.
    pub fn add_visitor(
        &mut self,
        user_id: UserId,
        tier: TierLabel,
        joined_at: Timestamp,
    ) -> Result<Visitor, SessionError> {
        if self.visitors.contains_key(&user_id) {
            return Err(SessionError::AlreadyInside);
        }

        let visitor = Visitor {
            user_id: user_id.clone(),
            tier,
            joined_at,
        };
        self.visitors.insert(user_id, visitor.clone());
        Ok(visitor)
    }

    /// Remove a visitor. None if they were not inside (leave is idempotent).
    pub fn remove_visitor(&mut self, user_id: &UserId) -> Option<Visitor> {
        self.visitors.remove(user_id)
    }

    /// Empty the room, returning everyone who was inside (join order)
    pub fn drain_visitors(&mut self) -> Vec<Visitor> {
        let mut evicted: Vec<Visitor> = self.visitors.drain().map(|(_, v)| v).collect();
        evicted.sort_by_key(|v| v.joined_at);
        evicted
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.visitors.contains_key(user_id)
    }

    pub fn visitor_count(&self) -> usize {
        self.visitors.len()
    }
}

/// Session operation errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Owner already has an active session")]
    AlreadyActive,

    #[error("Owner is not in the room")]
    NotActive,

    #[error("Visitor is already inside")]
    AlreadyInside,
}
