//! Thread-Safe Storage Engine
//!
//! The execution backend behind the command dispatcher: a concurrent,
//! binary-safe string store. All persistent state in the server lives
//! here; the parsing and dispatch layers above it hold nothing between
//! calls.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are hashed across
//!    64 independent `RwLock<HashMap>` shards to reduce contention.
//! 2. **`Bytes` values**: Stored keys and values are `bytes::Bytes`, so a
//!    GET hands back a cheap refcount clone rather than a copy.
//! 3. **Borrowed-key lookups**: Read-side operations take `&[u8]`, which
//!    lets the dispatcher pass argument slices straight from the input
//!    buffer without materializing a key.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions on different connections read and write different keys
//! concurrently; the engine owns all locking discipline.

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;

/// Number of shards for the storage engine.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// Errors surfaced by arithmetic storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The stored value does not parse as a 64-bit signed integer.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The increment or decrement would leave the 64-bit range.
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// A single shard holding a portion of the keyspace.
#[derive(Debug)]
struct Shard {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

/// Point-in-time snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
}

/// The key-value store shared by every session.
///
/// Designed to be wrapped in an `Arc` and handed to each connection task;
/// all operations are thread-safe.
///
/// # Example
///
/// ```
/// use rapidkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.set(Bytes::from("name"), Bytes::from("rapid"));
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("rapid")));
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of keys (approximate)
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new storage engine with default settings.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Sets a key-value pair, overwriting any previous value.
    ///
    /// Returns `true` if a new key was created, `false` if an existing
    /// key was updated.
    pub fn set(&self, key: Bytes, value: Bytes) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(&key);
        let mut data = shard.data.write().unwrap();

        let is_new = data.insert(key, value).is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Gets the value for a key, or `None` if it doesn't exist.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let data = shard.data.read().unwrap();
        data.get(key).cloned()
    }

    /// Deletes a key.
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let mut data = shard.data.write().unwrap();

        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Deletes multiple keys, returning how many existed.
    pub fn delete_many(&self, keys: &[&[u8]]) -> u64 {
        keys.iter().filter(|key| self.delete(key)).count() as u64
    }

    /// Checks if a key exists.
    pub fn exists(&self, key: &[u8]) -> bool {
        let shard = self.get_shard(key);
        let data = shard.data.read().unwrap();
        data.contains_key(key)
    }

    /// Counts how many of the given keys exist.
    pub fn exists_many(&self, keys: &[&[u8]]) -> u64 {
        keys.iter().filter(|key| self.exists(key)).count() as u64
    }

    /// Increments an integer value by `delta`, treating a missing key as 0.
    ///
    /// The value is stored back in its decimal string form, as Redis does.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64, StorageError> {
        let shard = self.get_shard(key);
        let mut data = shard.data.write().unwrap();

        let current = match data.get(key) {
            Some(value) => std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(StorageError::NotAnInteger)?,
            None => 0,
        };

        let new_value = current.checked_add(delta).ok_or(StorageError::Overflow)?;

        let is_new = data
            .insert(
                Bytes::copy_from_slice(key),
                Bytes::from(new_value.to_string()),
            )
            .is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(new_value)
    }

    /// Increments an integer value by 1.
    pub fn incr(&self, key: &[u8]) -> Result<i64, StorageError> {
        self.incr_by(key, 1)
    }

    /// Decrements an integer value by 1.
    pub fn decr(&self, key: &[u8]) -> Result<i64, StorageError> {
        self.incr_by(key, -1)
    }

    /// Appends bytes to a string, creating the key if needed.
    ///
    /// Returns the length of the string after the append.
    pub fn append(&self, key: &[u8], value: &[u8]) -> usize {
        let shard = self.get_shard(key);
        let mut data = shard.data.write().unwrap();

        if let Some(existing) = data.get_mut(key) {
            let mut combined = Vec::with_capacity(existing.len() + value.len());
            combined.extend_from_slice(existing);
            combined.extend_from_slice(value);
            let len = combined.len();
            *existing = Bytes::from(combined);
            len
        } else {
            self.key_count.fetch_add(1, Ordering::Relaxed);
            data.insert(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
            value.len()
        }
    }

    /// Gets the length of a string value, or 0 if the key doesn't exist.
    pub fn strlen(&self, key: &[u8]) -> usize {
        let shard = self.get_shard(key);
        let data = shard.data.read().unwrap();
        data.get(key).map(|v| v.len()).unwrap_or(0)
    }

    /// Clears all data from the store.
    pub fn flush(&self) {
        for shard in &self.shards {
            let mut data = shard.data.write().unwrap();
            data.clear();
        }
        self.key_count.store(0, Ordering::Relaxed);
    }

    /// Returns the approximate number of keys in the store.
    ///
    /// Approximate because the counter uses relaxed atomic ordering.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the engine counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
        }
    }
}
