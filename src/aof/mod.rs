//! Append-Only File (AOF) Module
//!
//! Provides durability by logging every mutating command.
//!
//! ## Responsibilities
//! - Append mutating commands exactly as received
//! - Replay the whole log at startup, before any client is served
//! - Force written bytes to stable storage from a background thread
//! - Report degraded durability instead of crashing on I/O failures
//!
//! ## File Format
//! ```text
//! *3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*4\r\n$4\r\nHSET\r\n...
//! └──────────────── record 1 ───────────────┘└─── record 2 ...
//! ```
//! Records are the wire encoding of the command arrays, concatenated in
//! append order. No header, checksum or sequence number.
//!
//! ## Phases
//! 1. Replay: startup only, single-threaded
//! 2. Steady state: concurrent appends plus the periodic flush
//!
//! Every file access goes through one mutex.

mod file;
mod flusher;

pub use file::{Aof, DurabilityStatus, ReplayStats};
pub use flusher::{Flusher, SyncTarget};
