//! Room event envelope
//!
//! Events serialize as `{type, data}` on the wire; kinds map 1:1 to the
//! state transitions that produce them.

use crate::core_presence::Visitor;
use crate::core_room::types::{DoorState, KnockId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How an access-list entry changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessListChange {
    Set,
    Removed,
}

/// A state-change notification scoped to one room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomEvent {
    DoorLocked {
        owner_id: UserId,
        door_state: DoorState,
    },
    DoorUnlocked {
        owner_id: UserId,
    },
    SettingsChanged {
        owner_id: UserId,
    },
    AccessListUpdated {
        owner_id: UserId,
        subject_id: UserId,
        change: AccessListChange,
    },
    KnockCreated {
        owner_id: UserId,
        knock_id: KnockId,
        visitor_id: UserId,
        message: Option<String>,
        expires_at: Timestamp,
    },
    KnockApproved {
        owner_id: UserId,
        knock_id: KnockId,
        visitor_id: UserId,
        remembered: bool,
    },
    KnockDenied {
        owner_id: UserId,
        knock_id: KnockId,
        visitor_id: UserId,
    },
    KnockExpired {
        owner_id: UserId,
        knock_id: KnockId,
        visitor_id: UserId,
    },
    SessionStarted {
        owner_id: UserId,
        started_at: Timestamp,
    },
    SessionEnded {
        owner_id: UserId,
    },
    VisitorEntered {
        owner_id: UserId,
        visitor: Visitor,
    },
    VisitorLeft {
        owner_id: UserId,
        visitor_id: UserId,
    },
}

impl RoomEvent {
    /// Wire name of the event kind (matches the serialized `type` field)
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::DoorLocked { .. } => "DOOR_LOCKED",
            RoomEvent::DoorUnlocked { .. } => "DOOR_UNLOCKED",
            RoomEvent::SettingsChanged { .. } => "SETTINGS_CHANGED",
            RoomEvent::AccessListUpdated { .. } => "ACCESS_LIST_UPDATED",
            RoomEvent::KnockCreated { .. } => "KNOCK_CREATED",
            RoomEvent::KnockApproved { .. } => "KNOCK_APPROVED",
            RoomEvent::KnockDenied { .. } => "KNOCK_DENIED",
            RoomEvent::KnockExpired { .. } => "KNOCK_EXPIRED",
            RoomEvent::SessionStarted { .. } => "SESSION_STARTED",
            RoomEvent::SessionEnded { .. } => "SESSION_ENDED",
            RoomEvent::VisitorEntered { .. } => "VISITOR_ENTERED",
            RoomEvent::VisitorLeft { .. } => "VISITOR_LEFT",
        }
    }

    /// The room this event is scoped to
    pub fn room_owner(&self) -> &UserId {
        match self {
            RoomEvent::DoorLocked { owner_id, .. }
            | RoomEvent::DoorUnlocked { owner_id }
            | RoomEvent::SettingsChanged { owner_id }
            | RoomEvent::AccessListUpdated { owner_id, .. }
            | RoomEvent::KnockCreated { owner_id, .. }
            | RoomEvent::KnockApproved { owner_id, .. }
            | RoomEvent::KnockDenied { owner_id, .. }
            | RoomEvent::KnockExpired { owner_id, .. }
            | RoomEvent::SessionStarted { owner_id, .. }
            | RoomEvent::SessionEnded { owner_id }
            | RoomEvent::VisitorEntered { owner_id, .. }
            | RoomEvent::VisitorLeft { owner_id, .. } => owner_id,
        }
    }
}
