//! Peoples Room core
//!
//! Per-user access-controlled rooms: durable room settings and access
//! lists, the keyed store with per-owner locking, and the service
//! orchestrator that ties the evaluator, knock workflow, presence
//! tracking, and event publication together.

pub mod access_list;
pub mod room;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod tests;

pub use access_list::{AccessListEntry, AccessMode};
pub use room::{Room, RoomError, SettingsPatch};
pub use service::{
    ForbiddenReason, KnockAction, MyStatus, OwnerRoomView, RoomService, RoomStatusView,
    ServiceError, ServiceResult, SessionView,
};
pub use store::{RoomShard, RoomStore};
pub use types::{
    DoorState, KnockId, PresenceMode, Timestamp, TierLabel, UserId, VisitorListMode,
};
