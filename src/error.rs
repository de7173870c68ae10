//! Error types for respkv
//!
//! Provides a unified error type for all operations.
//!
//! Command-level failures (wrong number of arguments and so on) are not
//! errors here: they travel back to the client as `Value::Error` replies.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for respkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The stream ended before a value was fully framed.
    ///
    /// `partial == false` means the stream ended exactly on a value boundary,
    /// which is how a finite log or a closing client signals "no more input".
    #[error("incomplete input (partial value: {partial})")]
    IncompleteInput { partial: bool },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("unknown type prefix: 0x{0:02x}")]
    UnknownType(u8),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol limit exceeded: {0}")]
    LimitExceeded(String),

    // -------------------------------------------------------------------------
    // Durability Errors
    // -------------------------------------------------------------------------
    #[error("append-only log is closed")]
    LogClosed,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// True when the stream ended cleanly between two values
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, KvError::IncompleteInput { partial: false })
    }

    /// True for errors caused by malformed or hostile input rather than I/O
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            KvError::Parse(_)
                | KvError::UnknownType(_)
                | KvError::Protocol(_)
                | KvError::LimitExceeded(_)
        )
    }
}
