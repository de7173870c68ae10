//! Protocol codec
//!
//! Reads values from a byte stream and serializes values back to bytes.
//! The same functions serve client sockets and the append-only log file.
//!
//! ## Wire Format
//! ```text
//! +OK\r\n                      simple string
//! -ERR message\r\n             error
//! :1000\r\n                    integer
//! $3\r\nbar\r\n                bulk string
//! $-1\r\n                      null
//! *2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n   array (length-prefixed, recursive)
//! ```

use std::io::{BufRead, ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::ProtocolLimits;
use crate::error::{KvError, Result};
use super::value::{Value, ARRAY, BULK, ERROR, INTEGER, SIMPLE_STRING};

const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Reading
// =============================================================================

/// Streaming decoder over any buffered reader
///
/// Decodes exactly one complete value per `read_value` call. The count of
/// bytes belonging to fully decoded values is tracked so callers can find the
/// offset of the last complete record in a log.
pub struct RespReader<R> {
    inner: R,
    limits: ProtocolLimits,
    consumed: u64,
}

impl<R: BufRead> RespReader<R> {
    /// Create a reader with the default limits
    pub fn new(inner: R) -> Self {
        Self::with_limits(inner, ProtocolLimits::default())
    }

    pub fn with_limits(inner: R, limits: ProtocolLimits) -> Self {
        Self {
            inner,
            limits,
            consumed: 0,
        }
    }

    /// Bytes consumed by successfully decoded values so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Read one complete value
    ///
    /// Fails with `IncompleteInput { partial: false }` when the stream is
    /// already exhausted, and with `IncompleteInput { partial: true }` when it
    /// ends in the middle of a value.
    pub fn read_value(&mut self) -> Result<Value> {
        let mut read = 0u64;
        let prefix = match self.read_byte(&mut read)? {
            Some(byte) => byte,
            None => return Err(KvError::IncompleteInput { partial: false }),
        };

        let value = self.read_typed(prefix, 0, &mut read)?;
        self.consumed += read;
        Ok(value)
    }

    fn read_typed(&mut self, prefix: u8, depth: usize, read: &mut u64) -> Result<Value> {
        match prefix {
            SIMPLE_STRING => {
                let line = self.read_line(read)?;
                Ok(Value::SimpleString(String::from_utf8_lossy(&line).into_owned()))
            }
            ERROR => {
                let line = self.read_line(read)?;
                Ok(Value::Error(String::from_utf8_lossy(&line).into_owned()))
            }
            INTEGER => Ok(Value::Integer(self.read_integer(read)?)),
            BULK => self.read_bulk(read),
            ARRAY => self.read_array(depth, read),
            other => Err(KvError::UnknownType(other)),
        }
    }

    fn read_bulk(&mut self, read: &mut u64) -> Result<Value> {
        let len = match self.read_length("bulk", read)? {
            Some(len) => len,
            None => return Ok(Value::Null),
        };

        if len > self.limits.max_bulk_len {
            return Err(KvError::LimitExceeded(format!(
                "bulk length {} exceeds {}",
                len, self.limits.max_bulk_len
            )));
        }

        // Grow with the data actually received instead of trusting the header
        let mut payload = Vec::with_capacity(len.min(64 * 1024));
        (&mut self.inner).take(len as u64).read_to_end(&mut payload)?;
        *read += payload.len() as u64;
        if payload.len() < len {
            return Err(KvError::IncompleteInput { partial: true });
        }

        let trailer = self.read_line(read)?;
        if !trailer.is_empty() {
            return Err(KvError::Protocol(format!(
                "bulk payload longer than declared length {}",
                len
            )));
        }

        Ok(Value::Bulk(Bytes::from(payload)))
    }

    fn read_array(&mut self, depth: usize, read: &mut u64) -> Result<Value> {
        let len = match self.read_length("array", read)? {
            Some(len) => len,
            None => return Ok(Value::Null),
        };

        if depth >= self.limits.max_depth {
            return Err(KvError::LimitExceeded(format!(
                "array nesting deeper than {}",
                self.limits.max_depth
            )));
        }
        if len > self.limits.max_array_len {
            return Err(KvError::LimitExceeded(format!(
                "array length {} exceeds {}",
                len, self.limits.max_array_len
            )));
        }

        let mut values = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let prefix = self
                .read_byte(read)?
                .ok_or(KvError::IncompleteInput { partial: true })?;
            values.push(self.read_typed(prefix, depth + 1, read)?);
        }

        Ok(Value::Array(values))
    }

    /// Parse a length header. `-1` means null.
    fn read_length(&mut self, kind: &str, read: &mut u64) -> Result<Option<usize>> {
        match self.read_integer(read)? {
            -1 => Ok(None),
            n if n < 0 => Err(KvError::Protocol(format!("invalid {} length {}", kind, n))),
            n => usize::try_from(n)
                .map(Some)
                .map_err(|_| KvError::LimitExceeded(format!("{} length {} too large", kind, n))),
        }
    }

    fn read_integer(&mut self, read: &mut u64) -> Result<i64> {
        let line = self.read_line(read)?;
        std::str::from_utf8(&line)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| {
                KvError::Parse(format!(
                    "invalid integer {:?}",
                    String::from_utf8_lossy(&line)
                ))
            })
    }

    /// Read up to and including the next CRLF, returning the line without it
    fn read_line(&mut self, read: &mut u64) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let (found, used) = {
                let available = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                if available.is_empty() {
                    return Err(KvError::IncompleteInput { partial: true });
                }

                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        line.extend_from_slice(&available[..=i]);
                        (true, i + 1)
                    }
                    None => {
                        line.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.inner.consume(used);
            *read += used as u64;

            if line.len() > self.limits.max_line_len + CRLF.len() {
                return Err(KvError::LimitExceeded(format!(
                    "line longer than {} bytes",
                    self.limits.max_line_len
                )));
            }
            if found && line.ends_with(CRLF) {
                line.truncate(line.len() - CRLF.len());
                return Ok(line);
            }
        }
    }

    fn read_byte(&mut self, read: &mut u64) -> Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => {
                    let byte = buf[0];
                    self.inner.consume(1);
                    *read += 1;
                    return Ok(Some(byte));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Decode a single value from a byte slice
pub fn decode(bytes: &[u8]) -> Result<Value> {
    RespReader::new(bytes).read_value()
}

// =============================================================================
// Writing
// =============================================================================

impl Value {
    /// Serialize to the wire format
    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.marshal_into(&mut buf);
        buf.freeze()
    }

    /// Serialize into an existing buffer
    pub fn marshal_into(&self, buf: &mut BytesMut) {
        match self {
            Value::SimpleString(text) => put_line(buf, SIMPLE_STRING, text.as_bytes()),
            Value::Error(text) => put_line(buf, ERROR, text.as_bytes()),
            Value::Integer(n) => put_line(buf, INTEGER, n.to_string().as_bytes()),
            Value::Bulk(data) => {
                put_line(buf, BULK, data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Value::Null => buf.extend_from_slice(b"$-1\r\n"),
            Value::Array(values) => {
                put_line(buf, ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.marshal_into(buf);
                }
            }
        }
    }
}

fn put_line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.put_u8(prefix);
    buf.extend_from_slice(body);
    buf.extend_from_slice(CRLF);
}

/// Write a value to a stream
///
/// The value is fully marshalled before the first byte is written.
pub fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    let bytes = value.marshal();
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
