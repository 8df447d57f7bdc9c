//! Client event consumer.
//!
//! Owns one transport connection per client process, the set of rooms of
//! interest, and the handler registry. Explicitly constructed and
//! started (`start`/`stop`) — never ambient global state. On disconnect
//! it retries with a fixed delay up to a bounded attempt count; on each
//! successful reconnect every tracked room is re-subscribed before the
//! state reports connected. The tracked room set is derived client
//! state, rebuilt onto the new connection — not a source of truth.

use crate::dispatch::{dispatch, Handler, HandlerGuard, HandlerRegistry};
use crate::error::ClientError;
use crate::transport::{Connector, Transport};
use peoplesroom_core::core_events::{ClientFrame, RoomEvent, ServerFrame};
use peoplesroom_core::core_room::UserId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection lifecycle as surfaced to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting,
    /// Retry budget exhausted; a new `start` is required
    Failed,
}

/// Reconnection and keepalive tuning
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay between attempts (deliberately not exponential)
    pub retry_delay: Duration,
    /// Consecutive failed attempts before giving up
    pub max_attempts: u32,
    /// Keepalive ping cadence
    pub ping_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            max_attempts: 10,
            ping_interval: Duration::from_secs(30),
        }
    }
}

enum Command {
    Subscribe(UserId),
    Unsubscribe(UserId),
    Stop,
}

/// The event-channel client service object
pub struct RoomEventClient {
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    registry: Arc<Mutex<HandlerRegistry>>,
    rooms: Arc<Mutex<HashSet<UserId>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl RoomEventClient {
    pub fn new(connector: Arc<dyn Connector>, config: ReconnectConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            registry: Arc::new(Mutex::new(HandlerRegistry::default())),
            rooms: Arc::new(Mutex::new(HashSet::new())),
            state_tx,
            state_rx,
            cmd_tx: None,
            task: None,
        }
    }

    /// Begin connecting and dispatching. Idempotent while running.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.cmd_tx = Some(cmd_tx);

        let worker = Worker {
            connector: self.connector.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            rooms: self.rooms.clone(),
            state_tx: self.state_tx.clone(),
        };
        self.task = Some(tokio::spawn(worker.run(cmd_rx)));
    }

    /// Stop the client and wait for the worker to wind down.
    pub async fn stop(&mut self) -> Result<(), ClientError> {
        let cmd_tx = self.cmd_tx.take().ok_or(ClientError::NotRunning)?;
        let _ = cmd_tx.send(Command::Stop);

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        let _ = self.state_tx.send(ConnectionState::Disconnected);
        Ok(())
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection-state changes (for the UI layer)
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Track a room and subscribe on the live connection (and every
    /// future reconnect).
    pub fn subscribe_room(&self, room_owner_id: UserId) {
        self.rooms
            .lock()
            .expect("room set lock poisoned")
            .insert(room_owner_id.clone());
        if let Some(cmd_tx) = &self.cmd_tx {
            let _ = cmd_tx.send(Command::Subscribe(room_owner_id));
        }
    }

    /// Stop tracking a room
    pub fn unsubscribe_room(&self, room_owner_id: &UserId) {
        self.rooms
            .lock()
            .expect("room set lock poisoned")
            .remove(room_owner_id);
        if let Some(cmd_tx) = &self.cmd_tx {
            let _ = cmd_tx.send(Command::Unsubscribe(room_owner_id.clone()));
        }
    }

    /// Rooms currently tracked (derived cache, authoritative server-side)
    pub fn tracked_rooms(&self) -> Vec<UserId> {
        self.rooms
            .lock()
            .expect("room set lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Register a handler for one event kind (wire name, e.g.
    /// `"KNOCK_CREATED"`). The returned guard unregisters on drop.
    pub fn on_event(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&RoomEvent) + Send + Sync + 'static,
    ) -> HandlerGuard {
        self.register(Some(kind.into()), Arc::new(handler))
    }

    /// Register a wildcard handler for every event
    pub fn on_any(&self, handler: impl Fn(&RoomEvent) + Send + Sync + 'static) -> HandlerGuard {
        self.register(None, Arc::new(handler))
    }

    fn register(&self, kind: Option<String>, handler: Handler) -> HandlerGuard {
        let id = self
            .registry
            .lock()
            .expect("handler registry lock poisoned")
            .register(kind.clone(), handler);
        HandlerGuard {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }
}

/// Connection worker: owns the reconnect state machine
struct Worker {
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    registry: Arc<Mutex<HandlerRegistry>>,
    rooms: Arc<Mutex<HashSet<UserId>>>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Why the connected phase ended
enum Interruption {
    Lost,
    Stopped,
}

impl Worker {
    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut attempts: u32 = 0;

        loop {
            match self.connector.connect().await {
                Ok(mut transport) => {
                    // Re-issue every tracked subscription before anything
                    // else is considered safe
                    if self.resubscribe(transport.as_mut()).await.is_err() {
                        debug!("resubscription failed, treating as lost connection");
                    } else {
                        attempts = 0;
                        let _ = self.state_tx.send(ConnectionState::Connected);
                        info!("event channel connected");

                        match self.serve(transport.as_mut(), &mut cmd_rx).await {
                            Interruption::Stopped => return,
                            Interruption::Lost => {
                                warn!("event channel connection lost");
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "connect attempt failed");
                }
            }

            attempts += 1;
            if attempts > self.config.max_attempts {
                warn!(attempts, "reconnect attempts exhausted, giving up");
                let _ = self.state_tx.send(ConnectionState::Failed);
                return;
            }

            let _ = self.state_tx.send(ConnectionState::Reconnecting);
            if self.backoff(&mut cmd_rx).await {
                return;
            }
        }
    }

    async fn resubscribe(&self, transport: &mut dyn Transport) -> Result<(), ()> {
        let wanted: Vec<UserId> = {
            let rooms = self.rooms.lock().expect("room set lock poisoned");
            rooms.iter().cloned().collect()
        };
        for room_owner_id in wanted {
            transport
                .send(ClientFrame::SubscribeRoom { room_owner_id })
                .await
                .map_err(|_| ())?;
        }
        Ok(())
    }

    /// Pump one live connection until it drops or the client stops.
    /// `Transport::recv` must be cancel-safe; it is raced against
    /// commands and the keepalive timer.
    async fn serve(
        &self,
        transport: &mut dyn Transport,
        cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Interruption {
        let mut ping = tokio::time::interval(self.config.ping_interval);
        // The first interval tick completes immediately; skip it
        ping.tick().await;

        enum Wake {
            Incoming(Result<ServerFrame, crate::transport::TransportError>),
            Cmd(Option<Command>),
            Ping,
        }

        loop {
            // The select yields before any of the handling below touches
            // the transport again
            let wake = tokio::select! {
                frame = transport.recv() => Wake::Incoming(frame),
                cmd = cmd_rx.recv() => Wake::Cmd(cmd),
                _ = ping.tick() => Wake::Ping,
            };

            let outgoing = match wake {
                Wake::Incoming(Ok(ServerFrame::Event(event))) => {
                    dispatch(&self.registry, &event);
                    None
                }
                Wake::Incoming(Ok(ServerFrame::Control(control))) => {
                    debug!(?control, "control frame");
                    None
                }
                Wake::Incoming(Err(_)) => {
                    let _ = self.state_tx.send(ConnectionState::Disconnected);
                    return Interruption::Lost;
                }
                Wake::Cmd(Some(Command::Subscribe(room_owner_id))) => {
                    Some(ClientFrame::SubscribeRoom { room_owner_id })
                }
                Wake::Cmd(Some(Command::Unsubscribe(room_owner_id))) => {
                    Some(ClientFrame::UnsubscribeRoom { room_owner_id })
                }
                Wake::Cmd(Some(Command::Stop)) | Wake::Cmd(None) => {
                    let _ = self.state_tx.send(ConnectionState::Disconnected);
                    return Interruption::Stopped;
                }
                Wake::Ping => Some(ClientFrame::Ping),
            };

            if let Some(frame) = outgoing {
                if transport.send(frame).await.is_err() {
                    let _ = self.state_tx.send(ConnectionState::Disconnected);
                    return Interruption::Lost;
                }
            }
        }
    }

    /// Fixed-delay wait, still servicing room-set updates. Returns true
    /// if the client was stopped.
    async fn backoff(&self, cmd_rx: &mut mpsc::UnboundedReceiver<Command>) -> bool {
        let delay = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return false,
                cmd = cmd_rx.recv() => match cmd {
                    // Room-set changes are already recorded in `rooms`;
                    // they will be replayed on the next connect
                    Some(Command::Subscribe(_)) | Some(Command::Unsubscribe(_)) => {}
                    Some(Command::Stop) | None => return true,
                }
            }
        }
    }
}
