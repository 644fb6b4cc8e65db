//! Broker engine
//!
//! The `Broker` is the registry of per-room topics. It is responsible for:
//! - creating a topic when a room is created and destroying it when the room
//!   is deleted, closing every subscription of that room
//! - handing out `Subscription`s, at most one open per (room, user)
//! - publishing events to every open subscription of a room
//!
//! Concurrency and usage notes:
//! - The broker is shared as `Arc<Broker>`. The registry sits behind its own
//!   `RwLock`, independent of any room membership lock held by callers.
//! - `publish` only holds the read lock long enough to snapshot the
//!   subscriber list. Delivery happens afterwards and never waits on a
//!   reader, so a slow client cannot hold up a room operation.
//! - Delivery is best effort: publishing to a missing topic is logged and
//!   otherwise ignored.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::broker::message::{Event, EventMessage};
use crate::broker::subscription::{CloseReason, Delivery, Mailbox, Subscription};
use crate::broker::topic::Topic;
use crate::room::{RoomId, UserId};
use crate::utils::error::{Resource, Result, RoomError};

#[derive(Debug)]
pub struct Broker {
    topics: RwLock<HashMap<RoomId, Topic>>,
    queue_capacity: usize,
}

impl Broker {
    /// Per-subscription queue size used by `Broker::new`.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    fn topics(&self) -> RwLockReadGuard<'_, HashMap<RoomId, Topic>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn topics_mut(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, Topic>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the topic paired with a new room. Returns `false` if the topic
    /// already existed, which means a room id was reused.
    pub fn create_topic(&self, room_id: &RoomId) -> bool {
        let mut topics = self.topics_mut();
        if topics.contains_key(room_id) {
            error!("Topic for room {room_id} already exists; keeping the existing one");
            return false;
        }
        topics.insert(room_id.clone(), Topic::new(room_id.clone()));
        debug!("Created topic for room {room_id}");
        true
    }

    /// Removes the room's topic and closes all of its subscriptions.
    pub fn destroy_topic(&self, room_id: &RoomId) -> bool {
        self.close_topic(room_id, CloseReason::RoomDeleted)
    }

    fn close_topic(&self, room_id: &RoomId, reason: CloseReason) -> bool {
        let removed = self.topics_mut().remove(room_id);
        match removed {
            Some(mut topic) => {
                let closed = topic.close_all(reason);
                debug!("Destroyed topic for room {room_id}, closed {closed} subscription(s)");
                true
            }
            None => {
                warn!("No topic to destroy for room {room_id}");
                false
            }
        }
    }

    pub fn has_topic(&self, room_id: &RoomId) -> bool {
        self.topics().contains_key(room_id)
    }

    pub fn topic_count(&self) -> usize {
        self.topics().len()
    }

    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.topics()
            .get(room_id)
            .map(Topic::subscriber_count)
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.topics()
            .get(room_id)
            .is_some_and(|topic| topic.is_subscribed(user_id))
    }

    /// Opens a subscription for `user_id` on the room's topic.
    pub fn subscribe(self: &Arc<Self>, room_id: &RoomId, user_id: &UserId) -> Result<Subscription> {
        let mut topics = self.topics_mut();
        let topic = topics
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(Resource::Topic(room_id.clone())))?;

        let mailbox = Arc::new(Mailbox::new(self.queue_capacity));
        topic.subscribe(user_id.clone(), mailbox.clone())?;
        debug!("{user_id} subscribed to room {room_id}");

        Ok(Subscription::new(
            room_id.clone(),
            user_id.clone(),
            mailbox,
            Arc::downgrade(self),
        ))
    }

    /// Closes the user's subscription on this room. Idempotent; returns
    /// whether anything was removed.
    pub fn unsubscribe(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let mailbox = self
            .topics_mut()
            .get_mut(room_id)
            .and_then(|topic| topic.unsubscribe(user_id));
        match mailbox {
            Some(mailbox) => {
                mailbox.close(CloseReason::Unsubscribed);
                debug!("{user_id} unsubscribed from room {room_id}");
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach(&self, room_id: &RoomId, user_id: &UserId, mailbox: &Arc<Mailbox>) {
        if let Some(topic) = self.topics_mut().get_mut(room_id) {
            topic.detach(user_id, mailbox);
        }
    }

    /// Delivers `event` to every open subscription of the room and returns
    /// how many subscriptions accepted it.
    pub fn publish(&self, room_id: &RoomId, event: Event) -> usize {
        let subscribers = match self.topics().get(room_id) {
            Some(topic) => topic.snapshot(),
            None => {
                warn!("Topic for room {room_id} not found; dropping {}", event.name());
                return 0;
            }
        };

        let message = EventMessage::now(room_id.clone(), event);
        let mut delivered = 0;
        for mailbox in subscribers {
            match mailbox.push(message.clone()) {
                Delivery::Queued => delivered += 1,
                Delivery::DroppedOldest => {
                    delivered += 1;
                    debug!("Subscriber queue full in room {room_id}; dropped oldest event");
                }
                Delivery::Closed => {}
            }
        }
        delivered
    }

    /// Destroys every topic so that no reader is left waiting.
    pub fn shutdown(&self) {
        let topics: Vec<RoomId> = self.topics().keys().cloned().collect();
        for room_id in &topics {
            self.close_topic(room_id, CloseReason::Shutdown);
        }
        info!("Broker shut down, closed {} topic(s)", topics.len());
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
