//! Event Delivery
//!
//! Room-scoped events, the server-side fan-out bus, and the wire frames
//! used on the client event channel.

pub mod bus;
pub mod event;
pub mod wire;

pub use bus::{EventBus, DEFAULT_EVENT_BUFFER};
pub use event::{AccessListChange, RoomEvent};
pub use wire::{ClientFrame, ControlFrame, ServerFrame};
