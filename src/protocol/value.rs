//! Value definitions
//!
//! The tagged data model shared by the codec, the command handlers and the
//! append-only log.

use bytes::Bytes;

/// Type prefix bytes of the wire grammar
pub const SIMPLE_STRING: u8 = b'+';
pub const ERROR: u8 = b'-';
pub const INTEGER: u8 = b':';
pub const BULK: u8 = b'$';
pub const ARRAY: u8 = b'*';

/// A single protocol value
///
/// Requests are always `Array`s of `Bulk` strings; replies may use any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `+<text>\r\n`
    SimpleString(String),

    /// `-<text>\r\n`
    Error(String),

    /// `:<n>\r\n`
    Integer(i64),

    /// `$<len>\r\n<bytes>\r\n`
    Bulk(Bytes),

    /// `$-1\r\n`
    Null,

    /// `*<n>\r\n` followed by n values
    Array(Vec<Value>),
}

impl Value {
    /// The `+OK` reply
    pub fn ok() -> Self {
        Value::SimpleString("OK".to_string())
    }

    pub fn simple(text: impl Into<String>) -> Self {
        Value::SimpleString(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Value::Error(text.into())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Value::Bulk(data.into())
    }

    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(values)
    }

    /// Build a request array of bulk strings, e.g. `["SET", "k", "v"]`
    pub fn command<I, A>(parts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        Value::Array(
            parts
                .into_iter()
                .map(|part| Value::Bulk(Bytes::copy_from_slice(part.as_ref())))
                .collect(),
        )
    }

    /// Raw bytes of a string-like value (bulk or simple string)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bulk(data) => Some(data),
            Value::SimpleString(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Human-readable variant name, used in log lines
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::SimpleString(_) => "simple-string",
            Value::Error(_) => "error",
            Value::Integer(_) => "integer",
            Value::Bulk(_) => "bulk",
            Value::Null => "null",
            Value::Array(_) => "array",
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Bulk(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::Bulk(data)
    }
}

impl From<Option<Bytes>> for Value {
    fn from(data: Option<Bytes>) -> Self {
        data.map_or(Value::Null, Value::Bulk)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}
