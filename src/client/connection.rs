use std::collections::HashMap;

use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::{CloseReason, Event, EventMessage, Subscription};
use crate::room::{RoomId, User, UserId};
use crate::transport::message::ServerMessage;

/// Frames buffered per connection before forwarders have to wait for the
/// socket. Subscriptions absorb the rest by dropping their oldest events.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Represents a connected WebSocket client.
#[derive(Debug)]
pub struct Client {
    /// Connection id, unique per socket.
    pub id: String,
    user: Option<User>,
    sender: Sender<WsMessage>,
    streams: HashMap<RoomId, JoinHandle<()>>,
}

impl Client {
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user: None,
            sender,
            streams: HashMap::new(),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn identify(&mut self, user: User) {
        self.user = Some(user);
    }

    /// True while a forwarder for `room_id` is still running.
    pub fn is_attached(&self, room_id: &RoomId) -> bool {
        self.streams
            .get(room_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Queues a frame for the socket. Returns `false` once the connection is
    /// gone.
    pub async fn send(&self, message: &ServerMessage) -> bool {
        send_to(&self.sender, message).await
    }

    /// Starts forwarding the subscription's events to this connection.
    pub fn attach(&mut self, subscription: Subscription) {
        let room_id = subscription.room_id().clone();
        let handle = tokio::spawn(forward(subscription, self.sender.clone()));
        if let Some(previous) = self.streams.insert(room_id, handle) {
            previous.abort();
        }
    }

    /// Stops forwarding for `room_id`. The subscription itself is dropped
    /// with its task.
    pub fn detach(&mut self, room_id: &RoomId) -> bool {
        match self.streams.remove(room_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) {
        for (_, handle) in self.streams.drain() {
            handle.abort();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

async fn forward(mut subscription: Subscription, sender: Sender<WsMessage>) {
    while let Some(message) = subscription.recv().await {
        if !send_to(&sender, &message.into()).await {
            return;
        }
    }

    // The mailbox discards what was queued on teardown, so the client still
    // needs to hear that the room is gone.
    if subscription.close_reason() == Some(CloseReason::RoomDeleted) {
        let farewell = EventMessage::now(subscription.room_id().clone(), Event::RoomDeleted {});
        send_to(&sender, &farewell.into()).await;
    }
    debug!(
        "Stream for {} in room {} ended",
        subscription.user_id(),
        subscription.room_id()
    );
}

pub(crate) async fn send_to(sender: &Sender<WsMessage>, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode outbound message: {e}");
            return false;
        }
    };
    sender.send(WsMessage::Text(text.into())).await.is_ok()
}
