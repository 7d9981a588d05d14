//! Session Consumption Loop
//!
//! A [`Session`] is the engine one connection drives: it takes a raw byte
//! buffer full of pipelined commands, consumes as many complete frames as
//! the buffer holds, executes each against the storage engine, and queues
//! the replies. The one number it hands back, bytes consumed, is the
//! contract with the I/O layer: everything before it has been fully
//! processed, everything after it is the prefix of a frame still in
//! flight and must be resubmitted once more bytes arrive.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    consume(buf)                        │
//! │                                                        │
//! │   ┌──────────┐  complete   ┌────────────┐              │
//! │   │  scan()  │────────────>│ dispatch() │──┐           │
//! │   └────┬─────┘             └────────────┘  │           │
//! │        │                          ▲        │ advance   │
//! │        │ incomplete               └────────┘           │
//! │        ▼                                               │
//! │   return bytes consumed so far                         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop never suspends, never blocks, and holds no locks of its own;
//! a malformed header is the only thing that aborts it. Frames are never
//! partially dispatched: execution happens strictly after a frame has
//! been recognized in full.

use crate::commands::{CommandError, Dispatcher};
use crate::protocol::reply::Reply;
use crate::protocol::scanner::{self, ScanError};
use crate::storage::StorageEngine;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tracing::trace;

/// Per-session counters.
///
/// Plain integers, not atomics: a session belongs to exactly one
/// connection task and is never shared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames recognized and executed against the backend.
    pub dispatched: u64,
    /// Frames rejected with an unknown-command error reply.
    pub unknown_commands: u64,
    /// Frames rejected with a wrong-arity error reply.
    pub arity_errors: u64,
    /// Total bytes of fully processed frames.
    pub bytes_consumed: u64,
}

/// One connection's view of the server: a dispatcher plus buffered output.
pub struct Session {
    /// Resolves and executes frames
    dispatcher: Dispatcher,

    /// Replies queued since the last [`Session::take_output`]
    out: BytesMut,

    /// Counters for this session
    stats: SessionStats,
}

impl Session {
    /// Creates a session executing against the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            dispatcher: Dispatcher::new(storage),
            out: BytesMut::new(),
            stats: SessionStats::default(),
        }
    }

    /// Consumes every complete frame at the front of `buf`.
    ///
    /// Returns the number of bytes covered by fully processed frames.
    /// `buf[consumed..]` is zero or one incomplete trailing frame; the
    /// caller keeps those bytes and calls again once more have arrived.
    /// Calling again with the same incomplete bytes is free and dispatches
    /// nothing.
    ///
    /// # Errors
    ///
    /// A [`ScanError`] means the stream is corrupted at a frame header and
    /// the next boundary cannot be located; the whole call fails and the
    /// connection should be dropped. Frames dispatched before the corrupt
    /// header have already executed and replied.
    pub fn consume(&mut self, buf: &[u8]) -> Result<usize, ScanError> {
        let mut cursor = 0;

        while cursor < buf.len() {
            let (frame, used) = match scanner::scan(&buf[cursor..])? {
                Some(complete) => complete,
                // Trailing frame still incomplete: leave the cursor at
                // its start so the caller can resubmit it intact.
                None => break,
            };

            if !frame.is_empty() {
                match self.dispatcher.dispatch(&frame) {
                    Ok(reply) => {
                        self.stats.dispatched += 1;
                        reply.write_to(&mut self.out);
                    }
                    Err(err) => {
                        match err {
                            CommandError::UnknownCommand(_) => self.stats.unknown_commands += 1,
                            CommandError::WrongArity(_) => self.stats.arity_errors += 1,
                        }
                        trace!(error = %err, "Frame rejected");
                        Reply::error(err.to_string()).write_to(&mut self.out);
                    }
                }
            }

            cursor += used;
        }

        self.stats.bytes_consumed += cursor as u64;
        trace!(
            consumed = cursor,
            remaining = buf.len() - cursor,
            "Buffer consumed"
        );
        Ok(cursor)
    }

    /// Drains the replies produced by `consume` calls so far.
    pub fn take_output(&mut self) -> Bytes {
        self.out.split().freeze()
    }

    /// Bytes of reply data currently queued.
    pub fn pending_output(&self) -> usize {
        self.out.len()
    }

    /// This session's counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The storage engine this session executes against.
    pub fn storage(&self) -> &StorageEngine {
        self.dispatcher.storage()
    }
}
