//! Request/Reply Protocol
//!
//! The input side is the [`scanner`]: a zero-copy recognizer for pipelined
//! command frames (inline lines and RESP arrays of bulk strings). The
//! output side is [`reply`]: RESP serialization of command responses.
//!
//! ## Example
//!
//! ```
//! use rapidkv::protocol::scanner::scan;
//!
//! let input = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (frame, consumed) = scan(input).unwrap().unwrap();
//! assert_eq!(frame.name(), Some(&b"GET"[..]));
//! assert_eq!(consumed, input.len());
//! ```

pub mod reply;
pub mod scanner;

// Re-export commonly used types for convenience
pub use reply::Reply;
pub use scanner::{scan, Frame, FrameKind, ScanError, ScanResult};
