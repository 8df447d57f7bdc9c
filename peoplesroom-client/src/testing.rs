//! In-memory transport for tests and local wiring.
//!
//! [`memory_pair`] yields the client half and a server half exposing the
//! raw channels; [`MemoryConnector`] replays a script of connection
//! outcomes so reconnect behavior can be exercised deterministically.

use crate::transport::{Connector, Transport, TransportError};
use async_trait::async_trait;
use peoplesroom_core::core_events::{ClientFrame, ServerFrame};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Client half of an in-memory connection
pub struct MemoryTransport {
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    incoming: mpsc::UnboundedReceiver<ServerFrame>,
}

/// Server half: observe client frames, push server frames.
/// Dropping `push` closes the connection from the client's view.
pub struct MemoryServerEnd {
    pub sent: mpsc::UnboundedReceiver<ClientFrame>,
    pub push: mpsc::UnboundedSender<ServerFrame>,
}

/// A connected in-memory transport pair
pub fn memory_pair() -> (MemoryTransport, MemoryServerEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            outgoing: out_tx,
            incoming: in_rx,
        },
        MemoryServerEnd {
            sent: out_rx,
            push: in_tx,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: ClientFrame) -> Result<(), TransportError> {
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<ServerFrame, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Closed)
    }
}

/// Scripted connector: each `connect` pops the next outcome
pub struct MemoryConnector {
    script: Mutex<VecDeque<Result<MemoryTransport, TransportError>>>,
}

impl MemoryConnector {
    pub fn new(script: Vec<Result<MemoryTransport, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// A connector that always fails
    pub fn always_failing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let next = self
            .script
            .lock()
            .expect("connector script lock poisoned")
            .pop_front();
        match next {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::ConnectFailed("no connection scripted".into())),
        }
    }
}
