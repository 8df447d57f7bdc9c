pub mod config;
pub mod core_access;
pub mod core_events;
pub mod core_knock;
pub mod core_presence;
pub mod core_room;
pub mod logging;
pub mod shutdown;

pub use logging::{init_logging, LogLevel};
