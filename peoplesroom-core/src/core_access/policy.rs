//! Tier policy table and the trust collaborator boundary
//!
//! Trust tiers are computed elsewhere; the core consumes them as opaque
//! labels through [`TierProvider`] and maps them to default entry modes
//! through [`TierPolicy`].

use crate::core_room::types::{TierLabel, UserId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Default behavior for a tier when no access-list entry overrides it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Tier members may enter without knocking
    DirectEntry,
    /// Tier members must knock and wait for approval
    Knock,
}

/// Externally-supplied table mapping tier labels to their default entry mode.
///
/// Tiers absent from the table evaluate to no visibility.
#[derive(Debug, Clone, Default)]
pub struct TierPolicy {
    defaults: HashMap<TierLabel, EntryMode>,
}

impl TierPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The product's standard table: close-circle tiers enter directly,
    /// everyone else knocks.
    pub fn standard() -> Self {
        let mut policy = Self::new();
        policy.insert(TierLabel::new("PEOPLES"), EntryMode::DirectEntry);
        policy.insert(TierLabel::new("OTHERS"), EntryMode::Knock);
        policy
    }

    pub fn insert(&mut self, tier: TierLabel, mode: EntryMode) {
        self.defaults.insert(tier, mode);
    }

    /// Default entry mode for a tier, or None if the tier is unknown
    pub fn default_mode(&self, tier: &TierLabel) -> Option<EntryMode> {
        self.defaults.get(tier).copied()
    }

    /// All tiers the policy knows about. New rooms are visible to these by default.
    pub fn known_tiers(&self) -> HashSet<TierLabel> {
        self.defaults.keys().cloned().collect()
    }
}

/// Identity/trust collaborator: yields the visitor's current tier for an owner.
///
/// Treated as ground truth by the evaluator; never cached by the core.
#[async_trait]
pub trait TierProvider: Send + Sync {
    async fn tier_for(&self, visitor: &UserId, owner: &UserId) -> TierLabel;
}

/// Fixed-map provider for tests and local development
#[derive(Debug, Clone)]
pub struct StaticTierProvider {
    default_tier: TierLabel,
    overrides: HashMap<(UserId, UserId), TierLabel>,
}

impl StaticTierProvider {
    pub fn new(default_tier: TierLabel) -> Self {
        Self {
            default_tier,
            overrides: HashMap::new(),
        }
    }

    /// Pin a (visitor, owner) pair to a tier
    pub fn set(&mut self, visitor: UserId, owner: UserId, tier: TierLabel) {
        self.overrides.insert((visitor, owner), tier);
    }
}

#[async_trait]
impl TierProvider for StaticTierProvider {
    async fn tier_for(&self, visitor: &UserId, owner: &UserId) -> TierLabel {
        self.overrides
            .get(&(visitor.clone(), owner.clone()))
            .cloned()
            .unwrap_or_else(|| self.default_tier.clone())
    }
}
