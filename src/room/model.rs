//! Room model
//!
//! A `Room` owns its invariants: it always has at least one member and its
//! owner is always one of them. Every mutation goes through a method that
//! either applies completely or returns an error without touching the room,
//! so the service can work on a loaded copy and simply discard it on failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::utils::error::{
    AuthorizationKind, ConflictKind, InvalidStateKind, Result, RoomError, ValidationError,
};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 20;

/// Opaque room identifier handed out by an `IdGenerator`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Checks that a display name has between 2 and 20 characters.
pub fn validate_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    let actual = name.chars().count();
    if (NAME_MIN_LEN..=NAME_MAX_LEN).contains(&actual) {
        Ok(())
    } else {
        Err(ValidationError::Length {
            field,
            min: NAME_MIN_LEN,
            max: NAME_MAX_LEN,
            actual,
        })
    }
}

/// The part of a user that rooms and events carry around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(id: UserId, name: &str) -> Result<Self, ValidationError> {
        validate_name("user name", name)?;
        Ok(Self {
            id,
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate member {0}")]
pub struct DuplicateMember(pub UserId);

/// Join-ordered, duplicate-free sequence of member ids.
///
/// The head of the sequence is always the earliest-joined member still
/// present, which is what owner succession relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct Members(Vec<UserId>);

impl Members {
    pub fn contains(&self, user: &UserId) -> bool {
        self.0.contains(user)
    }

    /// Appends `user` at the end. Returns `false` if already present.
    pub fn insert(&mut self, user: UserId) -> bool {
        if self.contains(&user) {
            return false;
        }
        self.0.push(user);
        true
    }

    /// Removes `user`, keeping the relative order of everyone else.
    pub fn remove(&mut self, user: &UserId) -> bool {
        match self.0.iter().position(|m| m == user) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// The member who joined first among those still present.
    pub fn earliest(&self) -> Option<&UserId> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }
}

impl TryFrom<Vec<UserId>> for Members {
    type Error = DuplicateMember;

    fn try_from(ids: Vec<UserId>) -> Result<Self, Self::Error> {
        let mut members = Members::default();
        for id in ids {
            if !members.insert(id.clone()) {
                return Err(DuplicateMember(id));
            }
        }
        Ok(members)
    }
}

impl From<Members> for Vec<UserId> {
    fn from(members: Members) -> Self {
        members.0
    }
}

/// What happened to a room after a member was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The last member left; the room must be deleted.
    Emptied,
    /// Members remain. `new_owner` is set when ownership moved.
    Remaining { new_owner: Option<UserId> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    name: String,
    owner_id: UserId,
    members: Members,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    playback: Option<Value>,
}

impl Room {
    /// A fresh room whose only member is its owner.
    pub fn new(id: RoomId, name: &str, owner_id: UserId) -> Result<Self, ValidationError> {
        validate_name("room name", name)?;
        let mut members = Members::default();
        members.insert(owner_id.clone());
        Ok(Self {
            id,
            name: name.to_string(),
            owner_id,
            members,
            playback: None,
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn members(&self) -> &Members {
        &self.members
    }

    pub fn playback(&self) -> Option<&Value> {
        self.playback.as_ref()
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    fn ensure_owner(&self, actor: &UserId) -> Result<()> {
        if &self.owner_id == actor {
            Ok(())
        } else {
            Err(RoomError::Authorization(AuthorizationKind::NotOwner))
        }
    }

    fn ensure_member(&self, user: &UserId) -> Result<()> {
        if self.is_member(user) {
            Ok(())
        } else {
            Err(RoomError::InvalidState(InvalidStateKind::NotMember))
        }
    }

    pub fn rename(&mut self, actor: &UserId, name: &str) -> Result<()> {
        validate_name("room name", name)?;
        self.ensure_owner(actor)?;
        self.name = name.to_string();
        Ok(())
    }

    pub fn join(&mut self, user: UserId) -> Result<()> {
        if self.members.insert(user) {
            Ok(())
        } else {
            Err(RoomError::Conflict(ConflictKind::AlreadyMember))
        }
    }

    pub fn leave(&mut self, user: &UserId) -> Result<Departure> {
        self.ensure_member(user)?;
        Ok(self.remove_member(user))
    }

    /// Owner-only removal of another member. The owner is never a valid
    /// target, not even for themselves.
    pub fn kick(&mut self, actor: &UserId, target: &UserId) -> Result<Departure> {
        self.ensure_owner(actor)?;
        if target == &self.owner_id {
            return Err(RoomError::Authorization(AuthorizationKind::SelfKick));
        }
        self.ensure_member(target)?;
        Ok(self.remove_member(target))
    }

    /// Last write wins; any member may update it.
    pub fn set_playback(&mut self, actor: &UserId, playback: Value) -> Result<()> {
        self.ensure_member(actor)?;
        self.playback = Some(playback);
        Ok(())
    }

    pub(crate) fn authorize_delete(&self, actor: &UserId) -> Result<()> {
        self.ensure_owner(actor)
    }

    fn remove_member(&mut self, user: &UserId) -> Departure {
        self.members.remove(user);
        let Some(head) = self.members.earliest().cloned() else {
            return Departure::Emptied;
        };
        if &self.owner_id == user {
            self.owner_id = head.clone();
            Departure::Remaining {
                new_owner: Some(head),
            }
        } else {
            Departure::Remaining { new_owner: None }
        }
    }
}
