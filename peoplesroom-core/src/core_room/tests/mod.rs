/*
    Integration tests for the room service

    Test suite covering:
    - Owner session lifecycle and eviction on exit
    - Door-state gating of knocks and entries
    - Knock lifecycle: create, approve/deny, remember, expiry, rate limit
    - Event ordering on the bus
    - Status views (presence ghosting, visitor list exposure)
*/

pub mod knock_flow;

use crate::config::RoomsConfig;
use crate::core_access::{StaticTierProvider, TierPolicy};
use crate::core_room::service::RoomService;
use crate::core_room::types::TierLabel;
use std::sync::Arc;

/// Service with the standard tier table and a configurable provider
pub fn service_with(provider: StaticTierProvider) -> Arc<RoomService> {
    Arc::new(RoomService::new(
        RoomsConfig::default(),
        TierPolicy::standard(),
        Arc::new(provider),
    ))
}

/// Service where everyone defaults to the knock-first OTHERS tier
pub fn service() -> Arc<RoomService> {
    service_with(StaticTierProvider::new(TierLabel::new("OTHERS")))
}
