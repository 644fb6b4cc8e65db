//! Subscriptions
//!
//! A `Subscription` is the receiving end a transport holds for one
//! (room, user) pair. The broker keeps the sending end, a `Mailbox`, in the
//! room's `Topic`.
//!
//! The mailbox is a fixed-capacity queue. Pushing never waits: when the
//! queue is full the oldest queued event is discarded to make room, so a
//! stalled reader costs at most `capacity` events of memory and never slows
//! down the publisher.
//!
//! Once closed, a mailbox drops everything queued and rejects new events.
//! `Subscription::recv` then returns `None`, and `close_reason` tells the
//! reader whether it unsubscribed, the room went away, or the process is
//! shutting down.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;

use crate::broker::engine::Broker;
use crate::broker::message::EventMessage;
use crate::room::{RoomId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Unsubscribed,
    RoomDeleted,
    Shutdown,
}

/// Result of a single push into a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Queued,
    /// Queued after evicting the oldest pending event.
    DroppedOldest,
    Closed,
}

#[derive(Debug, Default)]
struct Inbox {
    events: VecDeque<EventMessage>,
    closed: Option<CloseReason>,
    dropped: u64,
}

#[derive(Debug)]
pub(crate) struct Mailbox {
    capacity: usize,
    inbox: Mutex<Inbox>,
    notify: Notify,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inbox: Mutex::new(Inbox {
                events: VecDeque::with_capacity(capacity),
                ..Inbox::default()
            }),
            notify: Notify::new(),
        }
    }

    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, message: EventMessage) -> Delivery {
        let delivery = {
            let mut inbox = self.inbox();
            if inbox.closed.is_some() {
                return Delivery::Closed;
            }
            let delivery = if inbox.events.len() >= self.capacity {
                inbox.events.pop_front();
                inbox.dropped += 1;
                Delivery::DroppedOldest
            } else {
                Delivery::Queued
            };
            inbox.events.push_back(message);
            delivery
        };
        self.notify.notify_one();
        delivery
    }

    /// Closes the mailbox. Returns `true` only for the call that closed it.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        {
            let mut inbox = self.inbox();
            if inbox.closed.is_some() {
                return false;
            }
            inbox.closed = Some(reason);
            inbox.events.clear();
        }
        self.notify.notify_one();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inbox().closed.is_some()
    }
}

/// Receiving end of one (room, user) registration.
///
/// Dropping the handle closes it and removes it from the room's topic.
#[derive(Debug)]
pub struct Subscription {
    room_id: RoomId,
    user_id: UserId,
    mailbox: Arc<Mailbox>,
    broker: Weak<Broker>,
}

impl Subscription {
    pub(crate) fn new(
        room_id: RoomId,
        user_id: UserId,
        mailbox: Arc<Mailbox>,
        broker: Weak<Broker>,
    ) -> Self {
        Self {
            room_id,
            user_id,
            mailbox,
            broker,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Waits for the next event. Returns `None` once the subscription is
    /// closed; anything still queued at that point is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            {
                let mut inbox = self.mailbox.inbox();
                if let Some(message) = inbox.events.pop_front() {
                    return Some(message);
                }
                if inbox.closed.is_some() {
                    return None;
                }
            }
            self.mailbox.notify.notified().await;
        }
    }

    pub fn try_recv(&mut self) -> Option<EventMessage> {
        self.mailbox.inbox().events.pop_front()
    }

    /// Number of events waiting to be read.
    pub fn len(&self) -> usize {
        self.mailbox.inbox().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events evicted so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.mailbox.inbox().dropped
    }

    pub fn capacity(&self) -> usize {
        self.mailbox.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.mailbox.inbox().closed
    }

    /// Idempotent. Discards queued events and leaves the topic.
    pub fn close(&self) {
        if self.mailbox.close(CloseReason::Unsubscribed) {
            if let Some(broker) = self.broker.upgrade() {
                broker.detach(&self.room_id, &self.user_id, &self.mailbox);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
