//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `roomcast` application.
//!
//! This module centralizes reusable components: the error taxonomy shared by
//! the room service and the broker, logging setup, and room id generation.

pub mod error;
pub mod ids;
pub mod logging;
