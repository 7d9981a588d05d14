//! Storage Engine Module
//!
//! The execution backend for dispatched commands: a thread-safe, sharded,
//! binary-safe string store. Sessions never talk to each other; every
//! piece of shared state flows through this engine.
//!
//! ## Example
//!
//! ```
//! use rapidkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("name"), Bytes::from("rapid"));
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("rapid")));
//! assert_eq!(engine.incr(b"hits"), Ok(1));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageError, StorageStats};
