//! Per-visitor access overrides

use super::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Standing access rule for one visitor, overriding tier defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessListEntry {
    /// The visitor this rule applies to
    pub subject_id: UserId,

    /// Override mode
    pub access_mode: AccessMode,

    /// Optional owner notes
    pub notes: Option<String>,

    /// When the entry was created
    pub created_at: Timestamp,

    /// Last time the entry was updated
    pub updated_at: Timestamp,
}

impl AccessListEntry {
    pub fn new(subject_id: UserId, access_mode: AccessMode, notes: Option<String>) -> Self {
        let now = Timestamp::now();
        AccessListEntry {
            subject_id,
            access_mode,
            notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Access override modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    /// Enter without knocking (door state permitting)
    DirectEntry,
    /// Always knock, even if the tier default would allow direct entry
    MustKnock,
    /// Room is invisible and closed for this visitor
    NeverAllow,
}
