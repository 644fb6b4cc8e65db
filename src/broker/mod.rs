//! The broker fans room events out to live subscribers.
//!
//! - `engine`: the process-wide `Broker`, a registry of one `Topic` per room.
//! - `topic`: the subscriber set of a single room.
//! - `subscription`: a subscriber's bounded, drop-oldest event queue.
//! - `message`: the event catalogue and its timestamped envelope.

pub mod engine;
pub mod message;
pub mod subscription;
pub mod topic;

pub use engine::Broker;
pub use message::{Event, EventMessage};
pub use subscription::{CloseReason, Subscription};
