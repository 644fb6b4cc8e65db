//! # roomcast
//!
//! `roomcast` keeps shared rooms (a named group of users with one owner) and
//! streams every change of a room to the users subscribed to it, over
//! WebSockets.
//!
//! ## Core Modules
//!
//! - `room`: the room model and `RoomService`, the membership state machine
//!   (create, rename, join, leave, kick, delete, playback).
//! - `broker`: one topic per room, fanning events out to bounded per-user
//!   subscriptions.
//! - `client`: a connected WebSocket client and its subscription forwarders.
//! - `config`: loads server configuration from files and the environment.
//! - `persistence`: the `RoomStore` trait with sled and in-memory backends.
//! - `transport`: the WebSocket server and its JSON protocol.
//! - `utils`: errors, id generation and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod room;
pub mod transport;
pub mod utils;
