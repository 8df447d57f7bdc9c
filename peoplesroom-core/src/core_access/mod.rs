//! Access Control
//!
//! Pure permission evaluation for (visitor, room) pairs plus the trust
//! tier policy table and the collaborator boundary that supplies tiers.

pub mod evaluator;
pub mod policy;

pub use evaluator::{evaluate, AccessDecision, BlockedReason, Evaluation};
pub use policy::{EntryMode, StaticTierProvider, TierPolicy, TierProvider};
