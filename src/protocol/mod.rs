//! Protocol Module
//!
//! Defines the RESP-style wire protocol for client-server communication
//! and for the on-disk command log.
//!
//! ### Type Prefixes
//! - `+` simple string
//! - `-` error
//! - `:` integer
//! - `$` bulk string (`$-1` is null)
//! - `*` array
//!
//! Every length and line is terminated by CRLF, which never appears in the
//! decoded payload.

mod value;
mod codec;

pub use value::Value;
pub use codec::{decode, write_value, RespReader};
