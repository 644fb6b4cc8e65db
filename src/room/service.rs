//! Room service
//!
//! `RoomService` applies membership operations to stored rooms and keeps
//! each room's topic in step with it:
//! - a topic is created with its room and destroyed the moment the room's
//!   last member is gone (or the owner deletes it)
//! - events are published only after the store accepted the change; a store
//!   failure aborts the operation with nothing published
//!
//! Concurrency:
//! - Every mutating operation runs under a per-room mutex covering
//!   load → validate → mutate → persist → publish/teardown. Operations on
//!   different rooms never share a lock.
//! - The broker has its own lock. Publishing only enqueues into bounded
//!   mailboxes, so doing it while the room lock is held keeps each room's
//!   events in commit order without ever waiting on a subscriber.
//! - Room ids are never reused, so the lock of a deleted room can be dropped
//!   from the lock table: anyone still waiting on it will find the room gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info};

use crate::broker::{Broker, Event};
use crate::persistence::RoomStore;
use crate::room::model::{Departure, Room, RoomId, User, UserId, validate_name};
use crate::utils::error::{Resource, Result, RoomError};
use crate::utils::ids::IdGenerator;

pub struct RoomService {
    store: Arc<dyn RoomStore>,
    ids: Arc<dyn IdGenerator>,
    broker: Arc<Broker>,
    locks: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>, ids: Arc<dyn IdGenerator>, broker: Arc<Broker>) -> Self {
        Self {
            store,
            ids,
            broker,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<RoomId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn room_lock(&self, room_id: &RoomId) -> Arc<Mutex<()>> {
        self.lock_table().entry(room_id.clone()).or_default().clone()
    }

    fn forget_lock(&self, room_id: &RoomId) {
        self.lock_table().remove(room_id);
    }

    /// Runs `op` while holding the room's lock.
    fn serialized<T>(&self, room_id: &RoomId, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.room_lock(room_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let result = op();
        if matches!(&result, Err(RoomError::NotFound(Resource::Room(_)))) {
            self.forget_lock(room_id);
        }
        result
    }

    fn load_room(&self, room_id: &RoomId) -> Result<Room> {
        self.store
            .load_room(room_id)?
            .ok_or_else(|| RoomError::room_not_found(room_id))
    }

    fn load_user(&self, user_id: &UserId) -> Result<User> {
        self.store
            .load_user(user_id)?
            .ok_or_else(|| RoomError::user_not_found(user_id))
    }

    /// Records a user's display name so rooms and events can refer to them.
    pub fn register_user(&self, user_id: UserId, name: &str) -> Result<User> {
        let user = User::new(user_id, name)?;
        self.store.save_user(&user)?;
        debug!("Registered user {} as {}", user.id, user.name);
        Ok(user)
    }

    pub fn get_room(&self, room_id: &RoomId) -> Result<Room> {
        self.load_room(room_id)
    }

    pub fn create_room(&self, owner_id: &UserId, name: &str) -> Result<Room> {
        validate_name("room name", name)?;
        let owner = self.load_user(owner_id)?;
        let room_id = self.ids.next_id()?;
        let room = Room::new(room_id.clone(), name, owner.id)?;

        self.serialized(&room_id, || {
            self.store.save_room(&room)?;
            self.broker.create_topic(&room_id);
            Ok(())
        })?;

        info!("Room {} created by {}", room.id(), room.owner_id());
        Ok(room)
    }

    pub fn rename_room(&self, room_id: &RoomId, actor_id: &UserId, name: &str) -> Result<Room> {
        self.serialized(room_id, || {
            let mut room = self.load_room(room_id)?;
            room.rename(actor_id, name)?;
            self.store.save_room(&room)?;

            self.broker.publish(
                room_id,
                Event::RoomRenamed {
                    name: room.name().to_string(),
                },
            );
            info!("Room {room_id} renamed to {}", room.name());
            Ok(room)
        })
    }

    pub fn join_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<Room> {
        self.serialized(room_id, || {
            let mut room = self.load_room(room_id)?;
            let user = self.load_user(user_id)?;
            room.join(user.id.clone())?;
            self.store.save_room(&room)?;

            self.broker.publish(room_id, Event::UserJoined { user });
            info!("{user_id} joined room {room_id}");
            Ok(room)
        })
    }

    /// Removes `user_id` from the room. Returns the updated room, or `None`
    /// when they were the last member and the room was deleted.
    pub fn leave_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<Room>> {
        self.serialized(room_id, || {
            let mut room = self.load_room(room_id)?;
            let departure = room.leave(user_id)?;
            info!("{user_id} left room {room_id}");
            self.commit_departure(
                room,
                departure,
                Event::UserLeft {
                    user_id: user_id.clone(),
                },
            )
        })
    }

    /// Owner-only removal of another member.
    pub fn kick_member(
        &self,
        room_id: &RoomId,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<Option<Room>> {
        self.serialized(room_id, || {
            let mut room = self.load_room(room_id)?;
            let departure = room.kick(actor_id, target_id)?;
            info!("{target_id} kicked from room {room_id} by {actor_id}");
            self.commit_departure(
                room,
                departure,
                Event::UserKicked {
                    user_id: target_id.clone(),
                },
            )
        })
    }

    /// Owner-only deletion of the whole room.
    pub fn delete_room(&self, room_id: &RoomId, actor_id: &UserId) -> Result<()> {
        self.serialized(room_id, || {
            let room = self.load_room(room_id)?;
            room.authorize_delete(actor_id)?;
            self.teardown(room_id)
        })
    }

    /// Replaces the room's playback state. Any member may do this.
    pub fn update_playback(
        &self,
        room_id: &RoomId,
        actor_id: &UserId,
        playback: Value,
    ) -> Result<Room> {
        self.serialized(room_id, || {
            let mut room = self.load_room(room_id)?;
            room.set_playback(actor_id, playback.clone())?;
            self.store.save_room(&room)?;

            self.broker
                .publish(room_id, Event::PlaybackChanged { playback });
            debug!("Playback of room {room_id} updated by {actor_id}");
            Ok(room)
        })
    }

    /// Recreates a topic for every stored room. Called once at startup,
    /// before any client can connect.
    pub fn restore_topics(&self) -> Result<usize> {
        let rooms = self.store.list_rooms()?;
        for room in &rooms {
            self.broker.create_topic(room.id());
        }
        info!("Restored {} room topic(s)", rooms.len());
        Ok(rooms.len())
    }

    fn commit_departure(
        &self,
        room: Room,
        departure: Departure,
        event: Event,
    ) -> Result<Option<Room>> {
        match departure {
            Departure::Emptied => {
                self.teardown(room.id())?;
                Ok(None)
            }
            Departure::Remaining { new_owner } => {
                self.store.save_room(&room)?;
                self.broker.publish(room.id(), event);
                if let Some(owner_id) = new_owner {
                    info!("Ownership of room {} passed to {owner_id}", room.id());
                    self.broker
                        .publish(room.id(), Event::OwnerChanged { owner_id });
                }
                Ok(Some(room))
            }
        }
    }

    /// Deletes the room record, then closes its topic. Must run under the
    /// room lock.
    fn teardown(&self, room_id: &RoomId) -> Result<()> {
        self.store.delete_room(room_id)?;
        self.broker.destroy_topic(room_id);
        self.forget_lock(room_id);
        info!("Room {room_id} deleted");
        Ok(())
    }
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService")
            .field("broker", &self.broker)
            .field("locked_rooms", &self.lock_table().len())
            .finish()
    }
}
