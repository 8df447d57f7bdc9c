//! Event-channel client for Peoples Room.
//!
//! Maintains a single transport connection, tracks the set of rooms of
//! interest, re-subscribes after reconnects, and dispatches typed events
//! to registered handlers. Transport-agnostic: callers supply a
//! [`transport::Connector`]; tests use the in-memory pair in
//! [`testing`].

pub mod client;
pub mod dispatch;
pub mod error;
pub mod testing;
pub mod transport;

pub use client::{ConnectionState, ReconnectConfig, RoomEventClient};
pub use dispatch::HandlerGuard;
pub use error::ClientError;
pub use transport::{Connector, Transport, TransportError};
