//! The `persistence` module stores rooms and the users they refer to.
//!
//! The room service treats a successful store call as the commit point of
//! an operation: events are published only after the store accepted the
//! change. Two implementations ship with the crate:
//!
//! - `SledStore`: durable storage in an embedded `sled` database.
//! - `MemoryStore`: a `HashMap`-backed store for tests and ephemeral runs.

pub mod memory;
pub mod sled_store;

use thiserror::Error;

use crate::room::{Room, RoomId, User, UserId};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Room and user records, keyed by id.
///
/// Each call is atomic on its own; callers that need read-modify-write
/// consistency serialize access themselves.
pub trait RoomStore: Send + Sync {
    fn load_room(&self, id: &RoomId) -> Result<Option<Room>, StoreError>;

    /// Inserts or replaces the room.
    fn save_room(&self, room: &Room) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    fn delete_room(&self, id: &RoomId) -> Result<bool, StoreError>;

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    fn load_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Inserts or replaces the user.
    fn save_user(&self, user: &User) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests;
