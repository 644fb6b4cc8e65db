use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::persistence::{RoomStore, StoreError};
use crate::room::{Room, RoomId, User, UserId};

/// In-memory `RoomStore`. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomId, Room>>,
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomId, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn users(&self) -> MutexGuard<'_, HashMap<UserId, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoomStore for MemoryStore {
    fn load_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms().get(id).cloned())
    }

    fn save_room(&self, room: &Room) -> Result<(), StoreError> {
        self.rooms().insert(room.id().clone(), room.clone());
        Ok(())
    }

    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError> {
        Ok(self.rooms().remove(id).is_some())
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.rooms().values().cloned().collect())
    }

    fn load_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users().get(id).cloned())
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.users().insert(user.id.clone(), user.clone());
        Ok(())
    }
}
