//! Event definitions for the broker
//!
//! `Event` is the catalogue of room changes a subscriber can observe. On the
//! wire an event is its variant name plus a `data` object, for example
//! `{"event":"UserLeft","data":{"user_id":"alice"}}`.
//!
//! `EventMessage` is what actually sits in a subscriber's queue: the event,
//! the room it concerns and the publish time in milliseconds since the UNIX
//! epoch, stamped by the broker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::room::{RoomId, User, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    RoomRenamed { name: String },
    UserJoined { user: User },
    UserLeft { user_id: UserId },
    OwnerChanged { owner_id: UserId },
    UserKicked { user_id: UserId },
    PlaybackChanged { playback: Value },
    RoomDeleted {},
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RoomRenamed { .. } => "RoomRenamed",
            Event::UserJoined { .. } => "UserJoined",
            Event::UserLeft { .. } => "UserLeft",
            Event::OwnerChanged { .. } => "OwnerChanged",
            Event::UserKicked { .. } => "UserKicked",
            Event::PlaybackChanged { .. } => "PlaybackChanged",
            Event::RoomDeleted {} => "RoomDeleted",
        }
    }

    /// The event's payload without its tag.
    pub fn data(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(mut value) => value
                .get_mut("data")
                .map(Value::take)
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub room_id: RoomId,
    pub event: Event,
    pub timestamp: i64,
}

impl EventMessage {
    /// Wraps `event` with the current time.
    pub fn now(room_id: RoomId, event: Event) -> Self {
        Self {
            room_id,
            event,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
