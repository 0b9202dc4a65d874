//! Roadwatch protocol - wire messages for hub communication.
//!
//! Messages travel as one JSON object per newline-terminated line over a
//! persistent connection. The `type` field selects behavior on both sides.

pub mod message;

pub use message::{ClientMessage, ServerMessage};
