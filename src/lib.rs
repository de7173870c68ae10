//! # respkv
//!
//! A small in-memory key-value server speaking a Redis-style protocol:
//! - RESP codec shared by the network and the on-disk log
//! - Append-only log replayed at startup, fsynced in the background
//! - Flat string map and two-level hash map, each behind its own RwLock
//! - One thread per client connection
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (one thread per connection)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  RespReader → Value
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │          (append mutating commands, then dispatch)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │     AOF     │          │  Dispatcher  │
//!   │  (Mutex +   │          │ (CommandKind)│
//!   │   flusher)  │          └──────┬───────┘
//!   └──────┬──────┘                 │
//!          │ replay at startup      ▼
//!          └───────────────▶ ┌─────────────┐
//!                            │    Store    │
//!                            │ (2 RwLocks) │
//!                            └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod command;
pub mod aof;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use engine::Engine;
pub use protocol::Value;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
