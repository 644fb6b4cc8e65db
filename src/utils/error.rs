//! The `error` module defines the error types used within the `roomcast` application.
//!
//! Every room operation and every subscription attempt fails with a single
//! `RoomError`. The transport maps each variant to a status code through
//! `RoomError::status_code` and to a stable machine-readable string through
//! `RoomError::code`.

use std::fmt;

use thiserror::Error;

use crate::persistence::StoreError;
use crate::room::{RoomId, UserId};
use crate::utils::ids::IdError;

/// Malformed or out-of-range input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters, got {actual}")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },
}

/// The thing a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Room(RoomId),
    User(UserId),
    Topic(RoomId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Room(id) => write!(f, "room {id}"),
            Resource::User(id) => write!(f, "user {id}"),
            Resource::Topic(id) => write!(f, "stream for room {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error("user already in room")]
    AlreadyMember,
    #[error("user already subscribed to room")]
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationKind {
    #[error("user is not the room owner")]
    NotOwner,
    #[error("cannot kick owner from room")]
    SelfKick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidStateKind {
    #[error("user not in room")]
    NotMember,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    #[error("not authorized: {0}")]
    Authorization(AuthorizationKind),

    #[error("invalid state: {0}")]
    InvalidState(InvalidStateKind),

    #[error("room id not generated: {0}")]
    IdGeneration(#[from] IdError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

pub type Result<T, E = RoomError> = std::result::Result<T, E>;

impl RoomError {
    pub fn room_not_found(id: &RoomId) -> Self {
        RoomError::NotFound(Resource::Room(id.clone()))
    }

    pub fn user_not_found(id: &UserId) -> Self {
        RoomError::NotFound(Resource::User(id.clone()))
    }

    /// HTTP-equivalent status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::Validation(_) => 400,
            RoomError::InvalidState(_) => 400,
            RoomError::NotFound(_) => 404,
            RoomError::Conflict(_) => 409,
            RoomError::Authorization(_) => 403,
            RoomError::IdGeneration(_) | RoomError::Persistence(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RoomError::Validation(_) => "VALIDATION_FAILED",
            RoomError::NotFound(Resource::Room(_)) => "ROOM_NOT_FOUND",
            RoomError::NotFound(Resource::User(_)) => "USER_NOT_FOUND",
            RoomError::NotFound(Resource::Topic(_)) => "STREAM_NOT_FOUND",
            RoomError::Conflict(ConflictKind::AlreadyMember) => "ALREADY_MEMBER",
            RoomError::Conflict(ConflictKind::AlreadySubscribed) => "ALREADY_SUBSCRIBED",
            RoomError::Authorization(AuthorizationKind::NotOwner) => "NOT_OWNER",
            RoomError::Authorization(AuthorizationKind::SelfKick) => "SELF_KICK",
            RoomError::InvalidState(InvalidStateKind::NotMember) => "NOT_MEMBER",
            RoomError::IdGeneration(_) => "ID_GENERATION_FAILED",
            RoomError::Persistence(_) => "PERSISTENCE_FAILED",
        }
    }
}
