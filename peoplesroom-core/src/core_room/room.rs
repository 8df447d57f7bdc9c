//! Room data structures and operations

use super::access_list::{AccessListEntry, AccessMode};
use super::types::{DoorState, PresenceMode, Timestamp, TierLabel, UserId, VisitorListMode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A Room is one user's personal access-controlled space (1:1 with its owner)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Owning user (rooms are never shared)
    pub owner_id: UserId,

    /// Door gate applied before any per-visitor rule
    pub door_state: DoorState,

    /// Whether owner presence is shown to others
    pub presence_mode: PresenceMode,

    /// Tiers allowed to see the room exists
    pub visible_to_tiers: HashSet<TierLabel>,

    /// Who may see the live visitor list
    pub show_visitor_list_mode: VisitorListMode,

    /// Per-visitor overrides, unique per subject
    pub access_list: HashMap<UserId, AccessListEntry>,

    /// When the Room was created
    pub created_at: Timestamp,

    /// Last time Room settings were updated
    pub updated_at: Timestamp,
}

impl Room {
    /// Create a default room: door open, presence public, visible to the given tiers
    pub fn new(owner_id: UserId, visible_to_tiers: HashSet<TierLabel>) -> Self {
        let now = Timestamp::now();
        Room {
            owner_id,
            door_state: DoorState::Open,
            presence_mode: PresenceMode::PublicPresence,
            visible_to_tiers,
            show_visitor_list_mode: VisitorListMode::Everyone,
            access_list: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial settings update. Returns true if anything changed.
    pub fn apply_settings(&mut self, patch: SettingsPatch) -> bool {
        let mut changed = false;

        if let Some(mode) = patch.presence_mode {
            changed |= self.presence_mode != mode;
            self.presence_mode = mode;
        }
        if let Some(state) = patch.door_state {
            changed |= self.door_state != state;
            self.door_state = state;
        }
        if let Some(tiers) = patch.visible_to_tiers {
            changed |= self.visible_to_tiers != tiers;
            self.visible_to_tiers = tiers;
        }
        if let Some(mode) = patch.show_visitor_list_mode {
            changed |= self.show_visitor_list_mode != mode;
            self.show_visitor_list_mode = mode;
        }

        if changed {
            self.updated_at = Timestamp::now();
        }
        changed
    }

    /// Transition the door. Returns the previous state, or None if it was a no-op.
    pub fn set_door_state(&mut self, state: DoorState) -> Option<DoorState> {
        if self.door_state == state {
            return None;
        }
        let previous = self.door_state;
        self.door_state = state;
        self.updated_at = Timestamp::now();
        Some(previous)
    }

    /// Insert or replace the access-list entry for a subject
    pub fn upsert_access_entry(
        &mut self,
        subject_id: UserId,
        access_mode: AccessMode,
        notes: Option<String>,
    ) -> &AccessListEntry {
        use std::collections::hash_map::Entry;

        let now = Timestamp::now();
        let entry = match self.access_list.entry(subject_id) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.access_mode = access_mode;
                entry.notes = notes;
                entry.updated_at = now;
                entry
            }
            Entry::Vacant(vacant) => {
                let subject_id = vacant.key().clone();
                vacant.insert(AccessListEntry::new(subject_id, access_mode, notes))
            }
        };
        self.updated_at = now;
        entry
    }

    /// Remove the access-list entry for a subject
    pub fn remove_access_entry(&mut self, subject_id: &UserId) -> Result<AccessListEntry, RoomError> {
        let removed = self
            .access_list
            .remove(subject_id)
            .ok_or_else(|| RoomError::AccessEntryNotFound(subject_id.clone()))?;
        self.updated_at = Timestamp::now();
        Ok(removed)
    }

    /// Get the access-list entry for a subject, if any
    pub fn access_entry(&self, subject_id: &UserId) -> Option<&AccessListEntry> {
        self.access_list.get(subject_id)
    }

    /// Whether the door currently accepts new knocks and entries
    pub fn door_is_open(&self) -> bool {
        self.door_state == DoorState::Open
    }
}

/// Partial settings update, all fields optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub presence_mode: Option<PresenceMode>,
    pub door_state: Option<DoorState>,
    pub visible_to_tiers: Option<HashSet<TierLabel>>,
    pub show_visitor_list_mode: Option<VisitorListMode>,
}

/// Room operation errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("No access-list entry for user {0}")]
    AccessEntryNotFound(UserId),

    #[error("Only the room owner may do this")]
    NotOwner,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(labels: &[&str]) -> HashSet<TierLabel> {
        labels.iter().map(|l| TierLabel::new(*l)).collect()
    }

    #[test]
    fn test_default_room() {
        let room = Room::new(UserId::new("alice"), tiers(&["PEOPLES", "OTHERS"]));

        assert_eq!(room.door_state, DoorState::Open);
        assert_eq!(room.presence_mode, PresenceMode::PublicPresence);
        assert_eq!(room.show_visitor_list_mode, VisitorListMode::Everyone);
        assert!(room.access_list.is_empty());
    }

    #[test]
    fn test_settings_patch_partial() {
        let mut room = Room::new(UserId::new("alice"), tiers(&["PEOPLES"]));

        let changed = room.apply_settings(SettingsPatch {
            presence_mode: Some(PresenceMode::GhostPresence),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(room.presence_mode, PresenceMode::GhostPresence);
        // Untouched fields keep their defaults
        assert_eq!(room.door_state, DoorState::Open);
    }

    #[test]
    fn test_settings_patch_noop() {
        let mut room = Room::new(UserId::new("alice"), tiers(&["PEOPLES"]));
        let before = room.updated_at;

        let changed = room.apply_settings(SettingsPatch::default());
        assert!(!changed);
        assert_eq!(room.updated_at, before);
    }

    #[test]
    fn test_door_transition_reports_previous() {
        let mut room = Room::new(UserId::new("alice"), tiers(&["PEOPLES"]));

        assert_eq!(room.set_door_state(DoorState::Locked), Some(DoorState::Open));
        assert_eq!(room.set_door_state(DoorState::Locked), None);
        assert_eq!(
            room.set_door_state(DoorState::DoNotDisturb),
            Some(DoorState::Locked)
        );
    }

    #[test]
    fn test_upsert_access_entry_replaces() {
        let mut room = Room::new(UserId::new("alice"), tiers(&["PEOPLES"]));
        let bob = UserId::new("bob");

        room.upsert_access_entry(bob.clone(), AccessMode::MustKnock, None);
        room.upsert_access_entry(bob.clone(), AccessMode::DirectEntry, Some("ok".into()));

        assert_eq!(room.access_list.len(), 1);
        assert_eq!(
            room.access_entry(&bob).unwrap().access_mode,
            AccessMode::DirectEntry
        );
    }

    #[test]
    fn test_remove_missing_access_entry() {
        let mut room = Room::new(UserId::new("alice"), tiers(&["PEOPLES"]));
        let result = room.remove_access_entry(&UserId::new("bob"));
        assert!(matches!(result, Err(RoomError::AccessEntryNotFound(_))));
    }
}
