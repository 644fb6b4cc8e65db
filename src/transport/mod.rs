//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the JSON protocol spoken between clients and the server and
//! implements the server itself: accepting connections, parsing requests and
//! forwarding them to the `RoomService`, and streaming room events back.

pub mod message;
pub mod websocket;

#[cfg(test)]
mod tests;
