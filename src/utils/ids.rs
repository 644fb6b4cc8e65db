//! Room identifier allocation.
//!
//! The room service never invents ids itself; it asks an `IdGenerator`.
//! The default generator hands out random UUIDs.

use thiserror::Error;
use uuid::Uuid;

use crate::room::RoomId;

/// Raised when a generator cannot hand out a fresh id.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IdError(pub String);

pub trait IdGenerator: Send + Sync {
    /// Returns an id that has never been returned before.
    fn next_id(&self) -> Result<RoomId, IdError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> Result<RoomId, IdError> {
        Ok(RoomId::new(Uuid::new_v4().to_string()))
    }
}
