//! JSON protocol spoken over the WebSocket. Every frame is an object tagged
//! by `type`, e.g. `{"type":"join_room","room_id":"..."}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::EventMessage;
use crate::room::{Room, RoomId, UserId};
use crate::utils::error::RoomError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Identify { user_id: UserId, name: String },
    CreateRoom { name: String },
    GetRoom { room_id: RoomId },
    RenameRoom { room_id: RoomId, name: String },
    JoinRoom { room_id: RoomId },
    LeaveRoom { room_id: RoomId },
    Kick { room_id: RoomId, user_id: UserId },
    DeleteRoom { room_id: RoomId },
    UpdatePlayback { room_id: RoomId, playback: Value },
    Subscribe { room_id: RoomId },
    Unsubscribe { room_id: RoomId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Identified {
        user_id: UserId,
    },
    Room {
        room: Room,
    },
    #[serde(rename = "ok")]
    Done {},
    Error {
        status: u16,
        code: String,
        message: String,
    },
    Event {
        room_id: RoomId,
        event: String,
        data: Value,
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&RoomError> for ServerMessage {
    fn from(err: &RoomError) -> Self {
        ServerMessage::error(err.status_code(), err.code(), err.to_string())
    }
}

impl From<EventMessage> for ServerMessage {
    fn from(msg: EventMessage) -> Self {
        ServerMessage::Event {
            room_id: msg.room_id,
            event: msg.event.name().to_string(),
            data: msg.event.data(),
            timestamp: msg.timestamp,
        }
    }
}
