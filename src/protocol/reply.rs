//! Reply Serialization
//!
//! The output half of the protocol: every dispatched command produces
//! exactly one [`Reply`], which the session serializes into its outgoing
//! buffer in RESP wire format.
//!
//! ## Wire format
//!
//! - Simple string: `+OK\r\n`
//! - Error: `-ERR unknown command\r\n`
//! - Integer: `:1000\r\n`
//! - Bulk string: `$5\r\nhello\r\n`
//! - Null: `$-1\r\n`

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::protocol::scanner::CRLF;

/// A single command response.
///
/// Only the variants the command surface actually produces are modeled;
/// requests never echo back as nested structures here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Non-binary-safe status line, e.g. `+OK\r\n`.
    Simple(&'static str),

    /// Error line, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:1000\r\n`.
    Integer(i64),

    /// Binary-safe string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// The null bulk string `$-1\r\n`, Redis's "no such key".
    Null,
}

impl Reply {
    /// The canonical `+OK` response.
    pub fn ok() -> Self {
        Reply::Simple("OK")
    }

    /// The canonical `+PONG` response.
    pub fn pong() -> Self {
        Reply::Simple("PONG")
    }

    /// Creates an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Creates an integer reply.
    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates a bulk string reply.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// Creates the null reply.
    pub fn null() -> Self {
        Reply::Null
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serializes this reply into `buf` in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Reply::Simple(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Integer(n) => {
                buf.put_u8(b':');
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Bulk(data) => {
                buf.put_u8(b'$');
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Reply::Null => {
                buf.put_slice(b"$-1\r\n");
            }
        }
    }

    /// Serializes this reply into a fresh buffer.
    ///
    /// [`Reply::write_to`] is preferred on the hot path where the session
    /// reuses its outgoing buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Null => write!(f, "(nil)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string_wire_format() {
        assert_eq!(&Reply::ok().to_bytes()[..], b"+OK\r\n");
        assert_eq!(&Reply::pong().to_bytes()[..], b"+PONG\r\n");
    }

    #[test]
    fn error_wire_format() {
        let reply = Reply::error("ERR unknown command 'NOPE'");
        assert_eq!(&reply.to_bytes()[..], b"-ERR unknown command 'NOPE'\r\n");
        assert!(reply.is_error());
    }

    #[test]
    fn integer_wire_format() {
        assert_eq!(&Reply::integer(1000).to_bytes()[..], b":1000\r\n");
        assert_eq!(&Reply::integer(-42).to_bytes()[..], b":-42\r\n");
    }

    #[test]
    fn bulk_wire_format() {
        let reply = Reply::bulk(Bytes::from_static(b"hello"));
        assert_eq!(&reply.to_bytes()[..], b"$5\r\nhello\r\n");
    }

    #[test]
    fn empty_bulk_wire_format() {
        let reply = Reply::bulk(Bytes::new());
        assert_eq!(&reply.to_bytes()[..], b"$0\r\n\r\n");
    }

    #[test]
    fn null_wire_format() {
        assert_eq!(&Reply::null().to_bytes()[..], b"$-1\r\n");
    }

    #[test]
    fn replies_append_in_order() {
        let mut buf = BytesMut::new();
        Reply::ok().write_to(&mut buf);
        Reply::integer(2).write_to(&mut buf);
        Reply::null().write_to(&mut buf);
        assert_eq!(&buf[..], b"+OK\r\n:2\r\n$-1\r\n");
    }
}
