//! Zero-Copy Frame Scanner
//!
//! This module recognizes one complete request frame at a time inside a raw
//! byte buffer. It is the hot path of the whole server: pipelined clients
//! send many commands back-to-back in a single TCP segment, and the scanner
//! walks that buffer without copying a single payload byte. Every token in
//! the returned [`Frame`] is a borrowed slice into the caller's buffer.
//!
//! ## Request grammars
//!
//! Two encodings can appear on a connection, distinguished by the first
//! byte of the frame:
//!
//! - **Inline**: a plain text line terminated by CRLF, e.g. `PING\r\n`.
//!   Tokens are separated by spaces.
//! - **Array of bulk strings**: the RESP command encoding,
//!   `*<N>\r\n` followed by N repetitions of `$<L>\r\n<L bytes>\r\n`.
//!   The first bulk string is the command name, the rest are arguments.
//!
//! ## How the scanner works
//!
//! [`scan`] looks at the start of the buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - a complete frame, `consumed` bytes long
//! - `Ok(None)` - the buffer ends in the middle of a frame; scan again once
//!   more data has arrived
//! - `Err(ScanError)` - the stream is corrupted at this position
//!
//! Incompleteness is not an error: the caller keeps the bytes and retries.
//! A [`ScanError`] on the other hand means the next frame boundary can no
//! longer be located, so the connection has to go.
//!
//! Length tokens are parsed byte-wise as non-negative decimals. A declared
//! length is validated against fixed upper bounds *before* any allocation
//! happens, so an attacker-controlled header cannot make us reserve memory
//! for bytes that will never arrive.

use thiserror::Error;

/// The CRLF terminator used by both request grammars.
pub const CRLF: &[u8] = b"\r\n";

/// Maximum declared size of a single bulk-string argument (512 MB, the
/// same bound Redis enforces via `proto-max-bulk-len`).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum number of bulk strings in one command frame.
pub const MAX_FRAME_ELEMENTS: usize = 1024 * 1024;

/// A length token never needs more digits than `u32::MAX` has.
const MAX_LENGTH_DIGITS: usize = 10;

/// Errors that corrupt the framing of the input stream.
///
/// Any of these aborts the current consumption call: once a header fails
/// to parse, the position of the next frame is unknowable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A count or length token is not a valid non-negative decimal.
    #[error("malformed length token in frame header")]
    MalformedLength,

    /// An element inside an array frame did not start with `$`.
    #[error("unexpected byte in frame: {0:#04x}")]
    UnexpectedByte(u8),

    /// A declared bulk length exceeds the per-argument bound.
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },

    /// A declared element count exceeds the per-frame bound.
    #[error("frame declares {count} elements (max: {max})")]
    TooManyElements { count: usize, max: usize },

    /// A bulk payload was not followed by CRLF.
    #[error("bulk payload missing trailing CRLF")]
    BadTerminator,
}

/// Result type for scanning operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// How a command was encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// CRLF-terminated plain text line.
    Inline,
    /// Length-prefixed array of bulk strings.
    Array,
}

/// One complete command recognized in the input buffer.
///
/// A frame is a transient view: it borrows the buffer it was scanned from
/// and is only meant to live until the command has been dispatched. The
/// first token is the command name, the remaining tokens its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    kind: FrameKind,
    parts: Vec<&'a [u8]>,
}

impl<'a> Frame<'a> {
    /// The wire encoding this frame arrived in.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// The command name, or `None` for a blank inline line.
    pub fn name(&self) -> Option<&'a [u8]> {
        self.parts.first().copied()
    }

    /// The argument tokens following the command name.
    pub fn args(&self) -> &[&'a [u8]] {
        self.parts.get(1..).unwrap_or(&[])
    }

    /// Total number of tokens, command name included.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True for a blank inline line, which carries nothing to dispatch.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Attempts to recognize exactly one complete frame at the start of `buf`.
///
/// See the module docs for the three possible outcomes. On success the
/// returned count covers the whole frame including its final CRLF, so the
/// caller advances its cursor by exactly that much.
pub fn scan(buf: &[u8]) -> ScanResult<Option<(Frame<'_>, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    // `*` selects the array grammar; every other first byte is the start
    // of an inline line.
    if buf[0] == b'*' {
        scan_array(buf)
    } else {
        scan_inline(buf)
    }
}

/// Scans an inline command: space-separated tokens up to CRLF.
fn scan_inline(buf: &[u8]) -> ScanResult<Option<(Frame<'_>, usize)>> {
    let line_end = match find_crlf(buf) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let parts: Vec<&[u8]> = buf[..line_end]
        .split(|&b| b == b' ')
        .filter(|token| !token.is_empty())
        .collect();

    let frame = Frame {
        kind: FrameKind::Inline,
        parts,
    };
    Ok(Some((frame, line_end + 2)))
}

/// Scans an array-of-bulk-strings command: `*<N>\r\n` then N bulk strings.
fn scan_array(buf: &[u8]) -> ScanResult<Option<(Frame<'_>, usize)>> {
    debug_assert_eq!(buf[0], b'*');

    let (count, header_len) = match scan_length(&buf[1..])? {
        Some(parsed) => parsed,
        None => return Ok(None),
    };
    let mut cursor = 1 + header_len;

    if count > MAX_FRAME_ELEMENTS {
        return Err(ScanError::TooManyElements {
            count,
            max: MAX_FRAME_ELEMENTS,
        });
    }

    // Every element takes at least four bytes on the wire, so the buffer
    // itself bounds how much reservation a declared count can justify.
    let mut parts = Vec::with_capacity(count.min(buf.len() / 4));

    for _ in 0..count {
        let rest = &buf[cursor..];
        if rest.is_empty() {
            return Ok(None);
        }
        if rest[0] != b'$' {
            return Err(ScanError::UnexpectedByte(rest[0]));
        }

        let (len, header_len) = match scan_length(&rest[1..])? {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        if len > MAX_BULK_LEN {
            return Err(ScanError::BulkTooLarge {
                size: len,
                max: MAX_BULK_LEN,
            });
        }

        let data_start = cursor + 1 + header_len;
        let data_end = data_start + len;
        if buf.len() < data_end + 2 {
            return Ok(None);
        }
        if &buf[data_end..data_end + 2] != CRLF {
            return Err(ScanError::BadTerminator);
        }

        parts.push(&buf[data_start..data_end]);
        cursor = data_end + 2;
    }

    let frame = Frame {
        kind: FrameKind::Array,
        parts,
    };
    Ok(Some((frame, cursor)))
}

/// Parses a non-negative decimal length token terminated by CRLF.
///
/// Returns the value and the number of bytes consumed including the
/// terminator, or `Ok(None)` if the terminator has not arrived yet.
/// Anything other than 1..=10 ASCII digits followed by CRLF, with a value
/// in `u32` range, is malformed. Negative lengths are never valid in a
/// request stream: the null encodings (`$-1`, `*-1`) exist only on the
/// reply path.
fn scan_length(buf: &[u8]) -> ScanResult<Option<(usize, usize)>> {
    let mut value: u64 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {
                if i >= MAX_LENGTH_DIGITS {
                    return Err(ScanError::MalformedLength);
                }
                value = value * 10 + u64::from(byte - b'0');
            }
            b'\r' => {
                if i == 0 {
                    return Err(ScanError::MalformedLength);
                }
                if buf.len() < i + 2 {
                    // The `\n` half of the terminator is still in flight.
                    return Ok(None);
                }
                if buf[i + 1] != b'\n' {
                    return Err(ScanError::MalformedLength);
                }
                if value > u64::from(u32::MAX) {
                    return Err(ScanError::MalformedLength);
                }
                return Ok(Some((value as usize, i + 2)));
            }
            _ => return Err(ScanError::MalformedLength),
        }
    }

    Ok(None)
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if the full pair is present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    (0..buf.len().saturating_sub(1)).find(|&i| buf[i] == b'\r' && buf[i + 1] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_one(input: &[u8]) -> (Frame<'_>, usize) {
        scan(input).unwrap().expect("expected a complete frame")
    }

    #[test]
    fn inline_ping() {
        let (frame, consumed) = scan_one(b"PING\r\n");
        assert_eq!(frame.kind(), FrameKind::Inline);
        assert_eq!(frame.name(), Some(&b"PING"[..]));
        assert!(frame.args().is_empty());
        assert_eq!(consumed, 6);
    }

    #[test]
    fn inline_with_arguments() {
        let (frame, consumed) = scan_one(b"ECHO hello world\r\n");
        assert_eq!(frame.name(), Some(&b"ECHO"[..]));
        assert_eq!(frame.args(), &[&b"hello"[..], &b"world"[..]]);
        assert_eq!(consumed, 18);
    }

    #[test]
    fn inline_collapses_repeated_spaces() {
        let (frame, _) = scan_one(b"SET  a   b\r\n");
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.args(), &[&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn blank_inline_line_is_an_empty_frame() {
        let (frame, consumed) = scan_one(b"\r\n");
        assert!(frame.is_empty());
        assert_eq!(frame.name(), None);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn inline_incomplete_without_terminator() {
        assert_eq!(scan(b"PING").unwrap(), None);
        assert_eq!(scan(b"PING\r").unwrap(), None);
    }

    #[test]
    fn array_set_command() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\na\r\n";
        let (frame, consumed) = scan_one(input);
        assert_eq!(frame.kind(), FrameKind::Array);
        assert_eq!(frame.name(), Some(&b"SET"[..]));
        assert_eq!(frame.args(), &[&b"a"[..], &b"a"[..]]);
        assert_eq!(consumed, 27);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn array_with_empty_bulk_string() {
        let (frame, consumed) = scan_one(b"*2\r\n$3\r\nGET\r\n$0\r\n\r\n");
        assert_eq!(frame.args(), &[&b""[..]]);
        assert_eq!(consumed, 19);
    }

    #[test]
    fn array_payload_is_binary_safe() {
        let (frame, _) = scan_one(b"*2\r\n$3\r\nGET\r\n$5\r\na\x00\r\nb\r\n");
        assert_eq!(frame.args(), &[&b"a\x00\r\nb"[..]]);
    }

    #[test]
    fn array_incomplete_at_every_stage() {
        // header cut short
        assert_eq!(scan(b"*").unwrap(), None);
        assert_eq!(scan(b"*2").unwrap(), None);
        assert_eq!(scan(b"*2\r").unwrap(), None);
        // between elements
        assert_eq!(scan(b"*2\r\n$3\r\nGET\r\n").unwrap(), None);
        // inside a bulk length
        assert_eq!(scan(b"*2\r\n$3\r\nGET\r\n$1").unwrap(), None);
        // payload bytes missing their terminator
        assert_eq!(scan(b"*2\r\n$3\r\nGET\r\n$1\r\nb").unwrap(), None);
        assert_eq!(scan(b"*2\r\n$3\r\nGET\r\n$1\r\nb\r").unwrap(), None);
    }

    #[test]
    fn malformed_count_token() {
        assert_eq!(scan(b"*x\r\n"), Err(ScanError::MalformedLength));
        assert_eq!(scan(b"*2x\r\n"), Err(ScanError::MalformedLength));
        assert_eq!(scan(b"*\r\n"), Err(ScanError::MalformedLength));
        // negative counts are a reply-path concept
        assert_eq!(scan(b"*-1\r\n"), Err(ScanError::MalformedLength));
    }

    #[test]
    fn malformed_bulk_length_token() {
        assert_eq!(
            scan(b"*2\r\n$x\r\nAB\r\n$1\r\na\r\n"),
            Err(ScanError::MalformedLength)
        );
        assert_eq!(scan(b"*1\r\n$-1\r\n"), Err(ScanError::MalformedLength));
    }

    #[test]
    fn length_token_cannot_run_forever() {
        // 11 digits exceed what a 32-bit length could ever need.
        assert_eq!(scan(b"*1\r\n$99999999999\r\n"), Err(ScanError::MalformedLength));
        // 10 digits but out of u32 range.
        assert_eq!(scan(b"*1\r\n$9999999999\r\n"), Err(ScanError::MalformedLength));
    }

    #[test]
    fn bulk_length_above_bound_is_rejected() {
        let input = format!("*1\r\n${}\r\n", MAX_BULK_LEN + 1);
        assert_eq!(
            scan(input.as_bytes()),
            Err(ScanError::BulkTooLarge {
                size: MAX_BULK_LEN + 1,
                max: MAX_BULK_LEN
            })
        );
    }

    #[test]
    fn element_count_above_bound_is_rejected() {
        let input = format!("*{}\r\n", MAX_FRAME_ELEMENTS + 1);
        assert_eq!(
            scan(input.as_bytes()),
            Err(ScanError::TooManyElements {
                count: MAX_FRAME_ELEMENTS + 1,
                max: MAX_FRAME_ELEMENTS
            })
        );
    }

    #[test]
    fn huge_declared_count_with_short_buffer_is_just_incomplete() {
        // Below the element bound, so the scanner must wait for bytes
        // rather than reserving memory for a million slices.
        assert_eq!(scan(b"*1000000\r\n$1\r\na\r\n").unwrap(), None);
    }

    #[test]
    fn bulk_payload_missing_terminator() {
        assert_eq!(
            scan(b"*1\r\n$2\r\nabXX"),
            Err(ScanError::BadTerminator)
        );
    }

    #[test]
    fn array_element_must_be_a_bulk_string() {
        assert_eq!(
            scan(b"*1\r\n:42\r\n"),
            Err(ScanError::UnexpectedByte(b':'))
        );
    }

    #[test]
    fn stray_reply_byte_falls_back_to_inline() {
        // Anything that is not `*` starts an inline line, so a stray `$3`
        // line becomes a (bogus) inline command name, not a scan error.
        let (frame, consumed) = scan_one(b"$3\r\n");
        assert_eq!(frame.kind(), FrameKind::Inline);
        assert_eq!(frame.name(), Some(&b"$3"[..]));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn scan_stops_after_exactly_one_frame() {
        let input = b"PING\r\nPING\r\n";
        let (_, consumed) = scan_one(input);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn empty_buffer_is_incomplete() {
        assert_eq!(scan(b"").unwrap(), None);
    }
}
