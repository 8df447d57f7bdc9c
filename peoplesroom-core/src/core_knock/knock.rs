//! Knock requests and the per-room knock board
//!
//! A knock is a time-boxed request for entry approval. At most one
//! non-terminal knock exists per (owner, visitor) pair; terminal knocks
//! are kept for a short history window, then swept.

use crate::core_room::types::{KnockId, Timestamp, TierLabel, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Maximum knock message length in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Knock lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnockStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// A visitor's entry request against one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knock {
    /// Unique identifier
    pub id: KnockId,

    /// Room owner the knock is addressed to
    pub owner_id: UserId,

    /// Visitor who knocked
    pub visitor_id: UserId,

    /// Visitor's tier at knock time (recorded for the owner's view)
    pub visitor_tier: TierLabel,

    /// Optional message, bounded length
    pub message: Option<String>,

    /// Current state
    pub status: KnockStatus,

    /// When the knock was created
    pub created_at: Timestamp,

    /// Fixed TTL from creation; resolvable while `now <= expires_at`
    pub expires_at: Timestamp,

    /// When the knock reached a terminal state
    pub resolved_at: Option<Timestamp>,

    /// An approved knock grants exactly one entry
    pub consumed: bool,
}

impl Knock {
    /// Create a pending knock. Fails if the message is over length.
    pub fn new(
        owner_id: UserId,
        visitor_id: UserId,
        visitor_tier: TierLabel,
        message: Option<String>,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<Self, KnockError> {
        if let Some(msg) = &message {
            let len = msg.chars().count();
            if len > MAX_MESSAGE_CHARS {
                return Err(KnockError::MessageTooLong(len));
            }
        }

        Ok(Knock {
            id: KnockId::generate(),
            owner_id,
            visitor_id,
            visitor_tier,
            message,
            status: KnockStatus::Pending,
            created_at: now,
            expires_at: now.plus(ttl),
            resolved_at: None,
            consumed: false,
        })
    }

    /// Pending and within its TTL. The boundary is inclusive: a knock is
    /// still live at exactly `expires_at`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.status == KnockStatus::Pending && now <= self.expires_at
    }

    /// Move a pending knock past its TTL to Expired. Returns true if it lapsed.
    pub fn lapse_if_expired(&mut self, now: Timestamp) -> bool {
        if self.status == KnockStatus::Pending && now > self.expires_at {
            self.status = KnockStatus::Expired;
            self.resolved_at = Some(now);
            true
        } else {
            false
        }
    }

    fn resolve(&mut self, status: KnockStatus, now: Timestamp) -> Result<(), KnockError> {
        if self.lapse_if_expired(now) {
            return Err(KnockError::Expired);
        }
        match self.status {
            KnockStatus::Pending => {
                self.status = status;
                self.resolved_at = Some(now);
                Ok(())
            }
            KnockStatus::Expired => Err(KnockError::Expired),
            other => Err(KnockError::AlreadyResolved(other)),
        }
    }

    pub fn approve(&mut self, now: Timestamp) -> Result<(), KnockError> {
        self.resolve(KnockStatus::Approved, now)
    }

    pub fn deny(&mut self, now: Timestamp) -> Result<(), KnockError> {
        self.resolve(KnockStatus::Denied, now)
    }

    /// Redeem an approved knock for entry
    pub fn consume(&mut self) -> Result<(), KnockError> {
        if self.status != KnockStatus::Approved || self.consumed {
            return Err(KnockError::NotApproved);
        }
        self.consumed = true;
        Ok(())
    }
}

/// Knock operation errors
#[derive(Debug, thiserror::Error)]
pub enum KnockError {
    #[error("A knock is already pending for this visitor")]
    AlreadyPending,

    #[error("Knock message is {0} characters, limit is {MAX_MESSAGE_CHARS}")]
    MessageTooLong(usize),

    #[error("Knock not found")]
    NotFound,

    #[error("Knock has expired")]
    Expired,

    #[error("Knock was already resolved as {0:?}")]
    AlreadyResolved(KnockStatus),

    #[error("No unconsumed approved knock")]
    NotApproved,

    #[error("Knock rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// All knocks addressed to one room, keyed by visitor.
///
/// Keeps the latest knock per visitor; a new knock replaces a terminal one.
#[derive(Debug, Default)]
pub struct KnockBoard {
    by_visitor: HashMap<UserId, Knock>,
}

impl KnockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending knock. Conflict if one is already live.
    pub fn insert(&mut self, knock: Knock, now: Timestamp) -> Result<&Knock, KnockError> {
        if let Some(existing) = self.by_visitor.get_mut(&knock.visitor_id) {
            existing.lapse_if_expired(now);
            if existing.status == KnockStatus::Pending {
                return Err(KnockError::AlreadyPending);
            }
        }
        let visitor = knock.visitor_id.clone();
        self.by_visitor.insert(visitor.clone(), knock);
        Ok(&self.by_visitor[&visitor])
    }

    /// The visitor's current knock, if any (terminal included until pruned)
    pub fn get(&self, visitor_id: &UserId) -> Option<&Knock> {
        self.by_visitor.get(visitor_id)
    }

    pub fn get_mut(&mut self, visitor_id: &UserId) -> Option<&mut Knock> {
        self.by_visitor.get_mut(visitor_id)
    }

    /// Currently live knocks, oldest first
    pub fn pending(&self, now: Timestamp) -> Vec<&Knock> {
        let mut live: Vec<&Knock> = self
            .by_visitor
            .values()
            .filter(|k| k.is_live(now))
            .collect();
        live.sort_by_key(|k| k.created_at);
        live
    }

    /// Lapse overdue pending knocks and prune terminal ones older than the
    /// history window. Returns the knocks that newly expired, for event
    /// publication.
    pub fn sweep(&mut self, now: Timestamp, history_window: Duration) -> Vec<Knock> {
        let mut newly_expired = Vec::new();
        for knock in self.by_visitor.values_mut() {
            if knock.lapse_if_expired(now) {
                newly_expired.push(knock.clone());
            }
        }

        let horizon = history_window.as_millis() as u64;
        self.by_visitor.retain(|_, k| match k.resolved_at {
            Some(resolved) => now.millis_since(resolved) <= horizon,
            None => true,
        });

        newly_expired
    }
}
