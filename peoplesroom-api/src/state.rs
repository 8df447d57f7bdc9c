//! Shared application state

use peoplesroom_core::config::Config;
use peoplesroom_core::core_room::RoomService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RoomService>,
    pub config: Arc<Config>,
}
