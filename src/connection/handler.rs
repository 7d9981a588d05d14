//! Connection Handler Module
//!
//! Each client gets its own handler task that runs a read-consume-reply
//! loop. TCP is a stream protocol: a single read may deliver half a
//! command, or a hundred pipelined commands, or both at once. The handler
//! does not care: it accumulates bytes in a `BytesMut`, hands the whole
//! buffer to [`Session::consume`], and advances past exactly the bytes
//! the session reports as fully processed. Whatever remains is the prefix
//! of an in-flight frame and stays in the buffer for the next read.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. Handler task spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  Read bytes from socket      │
//!    │        │                     │
//!    │        ▼                     │
//!    │  session.consume(buffer)     │
//!    │        │                     │
//!    │        ▼                     │
//!    │  advance(consumed), send     │
//!    │  queued replies, loop back   │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / protocol error
//! ```

use crate::protocol::ScanError;
use crate::session::Session;
use crate::storage::StorageEngine;
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Maximum bytes a single connection may buffer (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics shared across all connections.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn commands_processed(&self, count: u64) {
        self.commands_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input stream is corrupted at a frame header
    #[error("Protocol error: {0}")]
    Protocol(#[from] ScanError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Stream ended with a partial frame still buffered
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Accumulated unprocessed input
    buffer: BytesMut,

    /// The consumption engine for this connection
    session: Session,

    /// Server-wide connection statistics
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new handler for an accepted connection.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        storage: Arc<StorageEngine>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            session: Session::new(storage),
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The read-consume-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let before = self.session.stats().dispatched;
            let consumed = match self.session.consume(&self.buffer) {
                Ok(consumed) => consumed,
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Corrupted input stream");
                    // Whatever replies were produced before the corrupt
                    // header still go out before the connection dies.
                    let _ = self.flush_output().await;
                    return Err(e.into());
                }
            };
            self.stats
                .commands_processed(self.session.stats().dispatched - before);

            if consumed > 0 {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    buffered = self.buffer.len(),
                    "Frames consumed"
                );
            }

            if self.session.pending_output() > 0 {
                self.flush_output().await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Writes all queued replies to the client.
    async fn flush_output(&mut self) -> Result<(), ConnectionError> {
        let output = self.session.take_output();
        self.stream.write_all(&output).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(output.len());
        trace!(client = %self.addr, bytes = output.len(), "Sent replies");
        Ok(())
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial frame left behind
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }
}

/// Handles a client connection to completion.
///
/// Convenience wrapper that builds a [`ConnectionHandler`] and swallows
/// the routine disconnect outcomes.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, storage, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
