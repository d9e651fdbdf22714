//! Wire messages exchanged over the WebSocket.
//!
//! Every frame is a JSON text frame shaped `{"event": .., "data": ..}`.

use crate::games::chess::{MoveRequest, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server to client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Seat granted to the receiving connection.
    PlayerRole(Role),
    /// Receiving connection has no seat.
    SpectatorRole,
    /// Canonical position as FEN.
    BoardState(String),
    /// An accepted move.
    Move(MoveRequest),
    /// Sender-only notice that a submitted move was dropped.
    InvalidMove(InvalidMove),
}

/// Payload of [`ServerMessage::InvalidMove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct InvalidMove {
    /// The `move` payload as received.
    pub request: Value,
    /// Human-readable reason.
    pub reason: String,
}

/// Client to server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Request to move a piece.
    Move(MoveRequest),
}

/// Envelope of a client frame with its payload still undecoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Why a client frame could not become a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum FrameError {
    /// Not a JSON `{event, data}` object.
    #[display("Unreadable frame: {}", _0)]
    Unreadable(String),

    /// Envelope named an event clients do not send.
    #[display("Unknown event {:?}", _0)]
    UnknownEvent(String),

    /// A `move` event whose payload is not a move request.
    #[display("Malformed move payload: {}", error)]
    MalformedMove {
        /// Payload as received.
        data: Value,
        /// Decoder message.
        error: String,
    },
}

impl std::error::Error for FrameError {}

/// Decodes one text frame sent by a client.
pub fn decode_client_frame(text: &str) -> Result<ClientMessage, FrameError> {
    let frame: ClientFrame =
        serde_json::from_str(text).map_err(|e| FrameError::Unreadable(e.to_string()))?;
    if frame.event != "move" {
        return Err(FrameError::UnknownEvent(frame.event));
    }
    match serde_json::from_value::<MoveRequest>(frame.data.clone()) {
        Ok(request) => Ok(ClientMessage::Move(request)),
        Err(e) => Err(FrameError::MalformedMove {
            data: frame.data,
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_payload_shape() {
        let value = serde_json::to_value(ServerMessage::PlayerRole(Role::Black)).unwrap();
        assert_eq!(value, json!({"event": "playerRole", "data": "b"}));
    }

    #[test]
    fn test_spectator_has_no_data() {
        let value = serde_json::to_value(ServerMessage::SpectatorRole).unwrap();
        assert_eq!(value, json!({"event": "spectatorRole"}));
    }

    #[test]
    fn test_client_move_without_promotion() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"move","data":{"from":"e2","to":"e4"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move(MoveRequest::new("e2", "e4")));
    }

    #[test]
    fn test_move_broadcast_omits_absent_promotion() {
        let message = ServerMessage::Move(MoveRequest::new("e7", "e5"));
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(value, json!({"event": "move", "data": {"from": "e7", "to": "e5"}}));
    }

    #[test]
    fn test_decode_accepts_well_formed_move() {
        let decoded = decode_client_frame(r#"{"event":"move","data":{"from":"e2","to":"e4"}}"#);
        assert_eq!(decoded, Ok(ClientMessage::Move(MoveRequest::new("e2", "e4"))));
    }

    #[test]
    fn test_decode_keeps_malformed_move_payload() {
        match decode_client_frame(r#"{"event":"move","data":{"from":5,"to":"e4"}}"#) {
            Err(FrameError::MalformedMove { data, .. }) => {
                assert_eq!(data, json!({"from": 5, "to": "e4"}))
            }
            other => panic!("Expected malformed move, got {:?}", other),
        }
        assert!(matches!(
            decode_client_frame(r#"{"event":"move","data":{"from":"e2"}}"#),
            Err(FrameError::MalformedMove { .. })
        ));
        assert!(matches!(
            decode_client_frame(r#"{"event":"move"}"#),
            Err(FrameError::MalformedMove { data: Value::Null, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_frames() {
        assert!(matches!(decode_client_frame("{not json"), Err(FrameError::Unreadable(_))));
        assert!(matches!(
            decode_client_frame(r#"{"event":"chat","data":"hi"}"#),
            Err(FrameError::UnknownEvent(event)) if event == "chat"
        ));
    }
}
