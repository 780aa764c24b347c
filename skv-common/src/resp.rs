//! # RESP Framing
//!
//! Purpose: Encode commands and incrementally decode the reply stream
//! without tying the codec to any particular socket type.
//!
//! ## Design Principles
//! 1. **Sans-IO Parsing**: `ReplyReader` owns a growable buffer; callers feed
//!    bytes and pull complete replies, so partial frames never block a socket.
//! 2. **Binary-Safe**: Blob arguments and bulk payloads are raw bytes.
//! 3. **Zero-Copy Blobs**: Large binary arguments become their own encoded
//!    segments instead of being copied into an accumulation buffer.
//! 4. **Fail Fast**: Invalid framing is fatal; no resynchronization is
//!    attempted on a corrupted stream.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Upper bound on a declared bulk payload, matching the conventional
/// 512MB server-side limit. Lengths beyond this are treated as corruption.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Upper bound on a declared array element count.
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Upper bound on a single framing line (type byte, length, CRLF).
const MAX_LINE_LEN: usize = 4096;

/// A single command argument.
///
/// `Blob` arguments are written to the wire as-is; everything else is
/// coerced to its decimal or UTF-8 string form at conversion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// String-coerced argument.
    Text(String),
    /// Binary-safe argument, passed through untouched.
    Blob(Bytes),
}

impl Arg {
    /// Raw bytes of the argument as they will appear on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Arg::Text(text) => text.as_bytes(),
            Arg::Blob(data) => data,
        }
    }

}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Blob(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Blob(Bytes::from(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Blob(value)
    }
}

macro_rules! arg_from_display {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Arg {
            fn from(value: $ty) -> Self {
                Arg::Text(value.to_string())
            }
        })*
    };
}

arg_from_display!(i32, i64, u32, u64, usize, f64);

/// Decoded reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// +OK or +PONG style responses.
    Simple(Vec<u8>),
    /// -ERR ... responses.
    Error(Vec<u8>),
    /// :123 responses.
    Integer(i64),
    /// $... bulk payloads, with None for the null marker.
    Bulk(Option<Vec<u8>>),
    /// *... arrays, recursively typed, with None for the null marker.
    Array(Option<Vec<Value>>),
}

impl Value {
    /// Payload of a non-null bulk reply.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Value::Bulk(Some(data)) => Some(data),
            _ => None,
        }
    }

    /// Payload of a simple status reply.
    pub fn as_simple(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(text) => Some(text),
            _ => None,
        }
    }

    /// Integer reply value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Elements of a non-null array reply.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::Array(Some(items)) => Some(items),
            _ => None,
        }
    }
}

/// Encodes a command as an ordered list of wire segments.
///
/// Text arguments coalesce into shared segments; each `Blob` becomes its own
/// segment so large binary payloads are never re-copied. Writing the segments
/// back to back yields the canonical array-of-bulk-strings frame, with the
/// command's own header always ahead of its first payload byte.
pub fn encode_command(name: &str, args: &[Arg]) -> Vec<Bytes> {
    let mut segments = Vec::new();
    let mut text = BytesMut::with_capacity(64);

    text.put_u8(b'*');
    put_decimal(&mut text, args.len() as u64 + 1);
    text.put_slice(b"\r\n");
    put_bulk_header(&mut text, name.len());
    text.put_slice(name.as_bytes());
    text.put_slice(b"\r\n");

    for arg in args {
        match arg {
            Arg::Text(value) => {
                put_bulk_header(&mut text, value.len());
                text.put_slice(value.as_bytes());
                text.put_slice(b"\r\n");
            }
            Arg::Blob(data) => {
                put_bulk_header(&mut text, data.len());
                segments.push(text.split().freeze());
                segments.push(data.clone());
                text.put_slice(b"\r\n");
            }
        }
    }

    if !text.is_empty() {
        segments.push(text.freeze());
    }
    segments
}

fn put_bulk_header(buf: &mut BytesMut, len: usize) {
    buf.put_u8(b'$');
    put_decimal(buf, len as u64);
    buf.put_slice(b"\r\n");
}

fn put_decimal(buf: &mut BytesMut, mut value: u64) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut digits = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        digits[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            digits[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        buf.put_u8(digits[idx]);
    }
}

/// Incremental reply decoder owning a growable buffer.
///
/// `feed` appends newly arrived bytes; `next` yields the next complete
/// top-level reply without consuming partial frames.
#[derive(Debug, Default)]
pub struct ReplyReader {
    buf: BytesMut,
}

impl ReplyReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        ReplyReader {
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Appends newly received bytes to the internal buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode the next complete reply.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A framing error is
    /// fatal for the stream; the caller must discard the connection.
    pub fn next(&mut self) -> Result<Option<Value>> {
        match parse_value(&self.buf)? {
            Some((value, consumed)) => {
                let _ = self.buf.split_to(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Number of buffered, not yet consumed bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn parse_value(input: &[u8]) -> Result<Option<(Value, usize)>> {
    let Some((line, mut consumed)) = parse_line(input)? else {
        return Ok(None);
    };
    if line.is_empty() {
        return Err(Error::Protocol("empty reply line".to_string()));
    }

    match line[0] {
        b'+' => Ok(Some((Value::Simple(line[1..].to_vec()), consumed))),
        b'-' => Ok(Some((Value::Error(line[1..].to_vec()), consumed))),
        b':' => Ok(Some((Value::Integer(parse_i64(&line[1..])?), consumed))),
        b'$' => {
            let len = parse_i64(&line[1..])?;
            if len < 0 {
                if len == -1 {
                    return Ok(Some((Value::Bulk(None), consumed)));
                }
                return Err(Error::Protocol("negative bulk length".to_string()));
            }
            let len = len as usize;
            if len > MAX_BULK_LEN {
                return Err(Error::Protocol("bulk length out of range".to_string()));
            }
            let end = consumed + len;
            if input.len() < end + 2 {
                return Ok(None);
            }
            if &input[end..end + 2] != b"\r\n" {
                return Err(Error::Protocol("bulk payload not terminated".to_string()));
            }
            Ok(Some((Value::Bulk(Some(input[consumed..end].to_vec())), end + 2)))
        }
        b'*' => {
            let count = parse_i64(&line[1..])?;
            if count < 0 {
                if count == -1 {
                    return Ok(Some((Value::Array(None), consumed)));
                }
                return Err(Error::Protocol("negative array length".to_string()));
            }
            let count = count as usize;
            if count > MAX_ARRAY_LEN {
                return Err(Error::Protocol("array length out of range".to_string()));
            }
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                match parse_value(&input[consumed..])? {
                    Some((item, used)) => {
                        items.push(item);
                        consumed += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Value::Array(Some(items)), consumed)))
        }
        other => Err(Error::Protocol(format!(
            "unknown reply type byte 0x{other:02x}"
        ))),
    }
}

fn parse_line(input: &[u8]) -> Result<Option<(&[u8], usize)>> {
    let Some(newline) = input.iter().position(|&b| b == b'\n') else {
        if input.len() > MAX_LINE_LEN {
            return Err(Error::Protocol("framing line too long".to_string()));
        }
        return Ok(None);
    };
    if newline == 0 || input[newline - 1] != b'\r' {
        return Err(Error::Protocol("framing line not CRLF terminated".to_string()));
    }
    Ok(Some((&input[..newline - 1], newline + 1)))
}

fn parse_i64(data: &[u8]) -> Result<i64> {
    let (negative, digits) = match data.first() {
        Some(b'-') => (true, &data[1..]),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(Error::Protocol("invalid integer".to_string()));
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(Error::Protocol("invalid integer".to_string()));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
    }

    if negative {
        Ok(-value)
    } else {
        Ok(value)
    }
}
