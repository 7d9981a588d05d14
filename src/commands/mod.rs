//! Command Dispatch Module
//!
//! The execution layer between the frame scanner and the storage engine:
//! resolves command names against a fixed table, validates arity, and
//! invokes the matching storage operation.
//!
//! ## Architecture
//!
//! ```text
//! Parsed Frame
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  (this module)
//! │                 │
//! │  - Resolve      │
//! │  - Check arity  │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET`, `GET`, `DEL`, `EXISTS`
//! - `INCR`, `INCRBY`, `DECR`, `DECRBY`
//! - `APPEND`, `STRLEN`
//!
//! ### Server Commands
//! - `PING`, `ECHO`, `QUIT`
//! - `DBSIZE`, `FLUSHDB`, `FLUSHALL`

pub mod dispatch;

// Re-export the dispatcher surface
pub use dispatch::{CommandError, Dispatcher};
