//! Store Module
//!
//! In-memory data for the server.
//!
//! ## Responsibilities
//! - Flat string map: key → value
//! - Hash map: hash name → (field → value)
//! - Independent reader/writer lock per map, so a GET never waits on an HSET
//!
//! ## Data Structure Choice
//! Plain `HashMap`s behind `parking_lot::RwLock`. Keys and values are
//! binary-safe `Bytes`. Absence is never an error; lookups return `Option`.

mod strings;
mod hashes;

pub use strings::StringMap;
pub use hashes::HashStore;

use bytes::Bytes;

/// Process-wide keyed state, constructed once and shared by handle
#[derive(Default)]
pub struct Store {
    strings: StringMap,
    hashes: HashStore,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Flat map
    // -------------------------------------------------------------------------

    pub fn set(&self, key: Bytes, value: Bytes) {
        self.strings.set(key, value);
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.strings.get(key)
    }

    /// Remove keys, returning how many existed
    pub fn del<'a>(&self, keys: impl IntoIterator<Item = &'a [u8]>) -> usize {
        self.strings.remove_all(keys)
    }

    // -------------------------------------------------------------------------
    // Hash map
    // -------------------------------------------------------------------------

    pub fn hset(&self, hash: Bytes, field: Bytes, value: Bytes) {
        self.hashes.set(hash, field, value);
    }

    pub fn hget(&self, hash: &[u8], field: &[u8]) -> Option<Bytes> {
        self.hashes.get(hash, field)
    }

    /// All (field, value) pairs of a hash, in no particular order
    pub fn hgetall(&self, hash: &[u8]) -> Vec<(Bytes, Bytes)> {
        self.hashes.get_all(hash)
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    /// Copy of the whole store, for comparisons in tests and tools
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            strings: self.strings.snapshot(),
            hashes: self.hashes.snapshot(),
        }
    }
}

/// Point-in-time copy of both maps
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSnapshot {
    pub strings: std::collections::HashMap<Bytes, Bytes>,
    pub hashes: std::collections::HashMap<Bytes, std::collections::HashMap<Bytes, Bytes>>,
}
