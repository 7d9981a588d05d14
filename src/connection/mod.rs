//! Connection Module
//!
//! Client connection management. Each accepted socket gets its own async
//! task running a read-consume-reply loop around a [`crate::session::Session`];
//! the task owns the connection's input buffer and carries partial frames
//! across reads.

pub mod handler;

// Re-export the main connection types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
