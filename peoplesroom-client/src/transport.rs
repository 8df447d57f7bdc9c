//! Transport seam for the event channel.
//!
//! The client is transport-agnostic: it speaks typed frames through
//! [`Transport`], and obtains fresh connections through [`Connector`]
//! when reconnecting. A WebSocket implementation serializes the frames
//! as JSON; tests use [`crate::testing`]'s in-memory pair.

use async_trait::async_trait;
use peoplesroom_core::core_events::{ClientFrame, ServerFrame};
use thiserror::Error;

/// Transport failures. All of them tear the connection down; recovery is
/// the reconnect state machine's job.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// One live connection to the event channel.
#[async_trait]
pub trait Transport: Send {
    /// Send a client frame.
    async fn send(&mut self, frame: ClientFrame) -> Result<(), TransportError>;

    /// Receive the next server frame. `Closed` means the connection is gone.
    async fn recv(&mut self) -> Result<ServerFrame, TransportError>;
}

/// Produces fresh connections; called once per (re)connect attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;
}
