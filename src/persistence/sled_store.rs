//! Persistence layer backed by `sled`
//!
//! Rooms and users live in two trees of one `sled` database, keyed by their
//! id and stored as JSON documents. Writes are applied immediately; call
//! `flush` to force them to disk (the server does so on shutdown).

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::{Db, Tree};

use crate::persistence::{RoomStore, StoreError};
use crate::room::{Room, RoomId, User, UserId};

const ROOMS_TREE: &str = "rooms";
const USERS_TREE: &str = "users";

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    rooms: Tree,
    users: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A database that is deleted when the last handle is dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let rooms = db.open_tree(ROOMS_TREE)?;
        let users = db.open_tree(USERS_TREE)?;
        Ok(Self { db, rooms, users })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(tree: &Tree, key: &str) -> Result<Option<T>, StoreError> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(tree: &Tree, key: &str, value: &T) -> Result<(), StoreError> {
        let serialized = serde_json::to_vec(value)?;
        tree.insert(key.as_bytes(), serialized)?;
        Ok(())
    }
}

impl RoomStore for SledStore {
    fn load_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Self::get(&self.rooms, id.as_str())
    }

    fn save_room(&self, room: &Room) -> Result<(), StoreError> {
        Self::put(&self.rooms, room.id().as_str(), room)
    }

    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError> {
        Ok(self.rooms.remove(id.as_str().as_bytes())?.is_some())
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.rooms
            .iter()
            .values()
            .map(|value| -> Result<Room, StoreError> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    fn load_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Self::get(&self.users, id.as_str())
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        Self::put(&self.users, user.id.as_str(), user)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
