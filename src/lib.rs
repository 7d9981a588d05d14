//! # rapidkv - A Pipelined In-Memory Key-Value Server
//!
//! rapidkv is a Redis-protocol, in-memory key-value server written in
//! Rust. Its center of gravity is the session consumption engine: a
//! zero-copy loop that takes a raw buffer of pipelined commands, scans
//! frame boundaries incrementally, executes each complete command, and
//! tells the connection layer exactly how many bytes it may discard.
//! Commands split across network reads, batches of hundreds of frames in
//! one read, and corrupted streams all fall out of that one contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           rapidkv                              │
//! │                                                                │
//! │  ┌────────────┐    ┌─────────────┐    ┌────────────────────┐   │
//! │  │ TCP Server │───>│ Connection  │───>│      Session       │   │
//! │  │ (Listener) │    │   Handler   │    │  consume(buffer)   │   │
//! │  └────────────┘    └─────────────┘    └──────┬─────────────┘   │
//! │                                              │                 │
//! │                         ┌────────────────────┼──────────┐      │
//! │                         ▼                    ▼          │      │
//! │                  ┌─────────────┐      ┌────────────┐    │      │
//! │                  │    Frame    │      │  Command   │    │      │
//! │                  │   Scanner   │      │ Dispatcher │    │      │
//! │                  └─────────────┘      └─────┬──────┘    │      │
//! │                                             │           │      │
//! │                                             ▼           │      │
//! │  ┌──────────────────────────────────────────────────┐   │      │
//! │  │                  StorageEngine                   │   │      │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐     │<──┘      │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │     │          │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │     │          │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘     │          │
//! │  └──────────────────────────────────────────────────┘          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use rapidkv::session::Session;
//! use rapidkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let mut session = Session::new(storage);
//!
//! // Two pipelined commands plus the start of a third.
//! let consumed = session
//!     .consume(b"PING\r\n*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\nb\r\n*2\r\n$3\r\nGE")
//!     .unwrap();
//!
//! assert_eq!(consumed, 33); // the partial GET stays buffered
//! assert_eq!(&session.take_output()[..], b"+PONG\r\n+OK\r\n");
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: zero-copy frame scanner and reply serialization
//! - [`commands`]: fixed dispatch table mapping names to operations
//! - [`session`]: the consumption loop tying scanner and dispatcher together
//! - [`storage`]: thread-safe sharded storage engine
//! - [`connection`]: per-client connection tasks
//!
//! ## Design Highlights
//!
//! ### Zero-Copy Scanning
//!
//! The scanner never copies payload bytes: a parsed frame is a set of
//! borrowed slices into the connection's read buffer. The only copy on a
//! SET's path happens when the key and value enter the storage engine.
//!
//! ### Pipelining
//!
//! Clients may send any number of commands before reading a single reply.
//! The session processes whatever is complete, reports how far it got,
//! and leaves a trailing partial frame for the next read to finish.
//!
//! ### Thread Safety
//!
//! Sessions are single-threaded and lock-free; all shared state lives in
//! the storage engine behind 64 sharded RwLocks.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, Dispatcher};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{scan, Frame, FrameKind, Reply, ScanError};
pub use session::{Session, SessionStats};
pub use storage::StorageEngine;

/// The default port rapidkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host rapidkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of rapidkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
