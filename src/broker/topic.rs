//! Topic management
//!
//! A `Topic` holds the live subscribers of one room, keyed by user id so a
//! user can hold at most one open subscription per room.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the broker
//! keeps every topic behind its registry lock).

use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::subscription::{CloseReason, Mailbox};
use crate::room::{RoomId, UserId};
use crate::utils::error::{ConflictKind, Result, RoomError};

#[derive(Debug)]
pub struct Topic {
    pub room_id: RoomId,
    subscribers: HashMap<UserId, Arc<Mailbox>>,
}

impl Topic {
    /// Create an empty topic for the given room.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            subscribers: HashMap::new(),
        }
    }

    /// Register a mailbox for `user`. Fails if the user already has an open one.
    pub(crate) fn subscribe(&mut self, user: UserId, mailbox: Arc<Mailbox>) -> Result<()> {
        if let Some(existing) = self.subscribers.get(&user) {
            if !existing.is_closed() {
                return Err(RoomError::Conflict(ConflictKind::AlreadySubscribed));
            }
        }
        self.subscribers.insert(user, mailbox);
        Ok(())
    }

    /// Remove and return the user's mailbox, if any.
    pub(crate) fn unsubscribe(&mut self, user: &UserId) -> Option<Arc<Mailbox>> {
        self.subscribers.remove(user)
    }

    /// Remove `user` only if the registered mailbox is this exact one, so a
    /// stale handle cannot evict a newer subscription.
    pub(crate) fn detach(&mut self, user: &UserId, mailbox: &Arc<Mailbox>) {
        if self
            .subscribers
            .get(user)
            .is_some_and(|current| Arc::ptr_eq(current, mailbox))
        {
            self.subscribers.remove(user);
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Mailbox>> {
        self.subscribers.values().cloned().collect()
    }

    /// Close every mailbox with `reason`, leaving the topic empty.
    pub(crate) fn close_all(&mut self, reason: CloseReason) -> usize {
        let closed = self.subscribers.len();
        for (_, mailbox) in self.subscribers.drain() {
            mailbox.close(reason);
        }
        closed
    }

    pub fn is_subscribed(&self, user: &UserId) -> bool {
        self.subscribers.contains_key(user)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
