//! The event channel
//!
//! One WebSocket per client. The client subscribes to rooms with
//! `{action: subscribe_room, room_owner_id}` frames; the server fans
//! room events out as `{type, data}` frames. Subscription re-runs the
//! access evaluator, so an invisible room cannot be watched. Connections
//! silent beyond the configured idle timeout are closed; `ping` frames
//! count as activity and are answered with `PONG`.

use crate::auth::CallerIdentity;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use peoplesroom_core::core_events::{ClientFrame, ControlFrame, RoomEvent};
use peoplesroom_core::core_room::UserId;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamMap;
use tracing::{debug, warn};

/// GET /ws
pub async fn event_channel(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, caller))
}

async fn handle_socket(socket: WebSocket, state: AppState, caller: UserId) {
    debug!(caller = %caller, "event channel connected");

    let (mut sink, mut stream) = socket.split();
    let mut subscriptions: StreamMap<UserId, BroadcastStream<RoomEvent>> = StreamMap::new();

    let idle_timeout = state.config.server.ws_idle_timeout;
    let mut last_activity = tokio::time::Instant::now();
    let mut idle_check = tokio::time::interval(idle_timeout / 4);

    // What woke the connection loop up. The select! yields one of these
    // so every pending future is dropped before the handling code runs.
    enum Wake {
        Client(Option<Result<Message, axum::Error>>),
        Room(UserId, Result<RoomEvent, BroadcastStreamRecvError>),
        IdleCheck,
    }

    loop {
        // An empty StreamMap yields None, which fails the pattern and
        // disables the branch until the next loop iteration
        let wake = tokio::select! {
            incoming = stream.next() => Wake::Client(incoming),
            Some((owner_id, event)) = subscriptions.next() => Wake::Room(owner_id, event),
            _ = idle_check.tick() => Wake::IdleCheck,
        };

        match wake {
            Wake::Client(incoming) => match incoming {
                Some(Ok(Message::Text(text))) => {
                    last_activity = tokio::time::Instant::now();
                    if handle_frame(&text, &state, &caller, &mut subscriptions, &mut sink)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    last_activity = tokio::time::Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(caller = %caller, error = %e, "event channel read error");
                    break;
                }
            },
            Wake::Room(owner_id, event) => {
                let outcome = match event {
                    Ok(event) => send_json(&mut sink, &event).await,
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!(caller = %caller, room = %owner_id, missed, "subscriber lagged, requesting resync");
                        send_json(&mut sink, &ControlFrame::Resync { room_owner_id: owner_id }).await
                    }
                };
                if outcome.is_err() {
                    break;
                }
            }
            Wake::IdleCheck => {
                if last_activity.elapsed() > idle_timeout {
                    debug!(caller = %caller, "event channel idle, closing");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    debug!(caller = %caller, "event channel disconnected");
}

async fn handle_frame(
    text: &str,
    state: &AppState,
    caller: &UserId,
    subscriptions: &mut StreamMap<UserId, BroadcastStream<RoomEvent>>,
    sink: &mut SplitSink<WebSocket, Message>,
) -> Result<(), ()> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            return send_json(
                sink,
                &ControlFrame::Error {
                    reason: format!("unrecognized frame: {}", e),
                },
            )
            .await;
        }
    };

    match frame {
        ClientFrame::Ping => send_json(sink, &ControlFrame::Pong).await,
        ClientFrame::SubscribeRoom { room_owner_id } => {
            // Subscribing to your own room materializes it; anyone else's
            // room goes through the evaluator like every other action
            let permitted = if &room_owner_id == caller {
                state.service.my_room(caller).await;
                Ok(())
            } else {
                state
                    .service
                    .room_status(&room_owner_id, caller)
                    .await
                    .map(|_| ())
            };

            match permitted {
                Ok(()) => {
                    let rx = state.service.bus().subscribe(&room_owner_id);
                    subscriptions.insert(room_owner_id.clone(), BroadcastStream::new(rx));
                    send_json(sink, &ControlFrame::Subscribed { room_owner_id }).await
                }
                Err(e) => {
                    send_json(
                        sink,
                        &ControlFrame::Error {
                            reason: e.to_string(),
                        },
                    )
                    .await
                }
            }
        }
        ClientFrame::UnsubscribeRoom { room_owner_id } => {
            subscriptions.remove(&room_owner_id);
            send_json(sink, &ControlFrame::Unsubscribed { room_owner_id }).await
        }
    }
}

async fn send_json<T: serde::Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), ()> {
    let text = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
