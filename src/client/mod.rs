//! The `client` module represents one WebSocket connection.
//!
//! A `Client` knows who is on the other end (once they identified), owns the
//! bounded outbound channel to its socket and one forwarding task per room
//! subscription.

pub mod connection;
pub use connection::Client;

#[cfg(test)]
mod tests;
