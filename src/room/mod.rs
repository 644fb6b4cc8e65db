//! Rooms and their membership state machine.
//!
//! - `model`: the `Room` record and the ordered member list, which enforce
//!   the membership invariants.
//! - `service`: `RoomService`, which serializes operations per room, commits
//!   them to the store and drives the broker (topic lifecycle and events).

pub mod model;
pub mod service;

pub use model::{Departure, Members, Room, RoomId, User, UserId};
pub use service::RoomService;
