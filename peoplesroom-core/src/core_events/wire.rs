//! Event-channel wire frames shared by the server and the client consumer

use super::event::RoomEvent;
use crate::core_room::types::UserId;
use serde::{Deserialize, Serialize};

/// Frames a client sends on the event channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    SubscribeRoom { room_owner_id: UserId },
    UnsubscribeRoom { room_owner_id: UserId },
    Ping,
}

/// Non-event frames the server sends (acks and keepalive replies)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlFrame {
    Pong,
    Subscribed { room_owner_id: UserId },
    Unsubscribed { room_owner_id: UserId },
    /// Sent when a subscriber lagged past the event buffer; the client
    /// must re-fetch room state rather than wait for a replay
    Resync { room_owner_id: UserId },
    /// A channel-level request failure (e.g. subscribing to an
    /// invisible room); the connection stays up
    Error { reason: String },
}

/// Anything the server may send: a room event or a control frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event(RoomEvent),
    Control(ControlFrame),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_wire_shape() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"subscribe_room","room_owner_id":"alice"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::SubscribeRoom {
                room_owner_id: UserId::new("alice")
            }
        );

        let ping: ClientFrame = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(ping, ClientFrame::Ping);
    }

    #[test]
    fn test_pong_has_no_data() {
        let json = serde_json::to_string(&ControlFrame::Pong).unwrap();
        assert_eq!(json, r#"{"type":"PONG"}"#);
    }

    #[test]
    fn test_server_frame_distinguishes_events_from_control() {
        let event = ServerFrame::Event(RoomEvent::SessionEnded {
            owner_id: UserId::new("alice"),
        });
        let text = serde_json::to_string(&event).unwrap();

        match serde_json::from_str::<ServerFrame>(&text).unwrap() {
            ServerFrame::Event(e) => assert_eq!(e.kind(), "SESSION_ENDED"),
            ServerFrame::Control(_) => panic!("expected an event frame"),
        }

        let pong = serde_json::to_string(&ControlFrame::Pong).unwrap();
        match serde_json::from_str::<ServerFrame>(&pong).unwrap() {
            ServerFrame::Control(ControlFrame::Pong) => {}
            other => panic!("expected PONG, got {:?}", other),
        }
    }
}
