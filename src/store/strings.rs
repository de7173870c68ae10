//! Flat string map
//!
//! HashMap-based map with RwLock for concurrency.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

/// key → value, last write wins
#[derive(Default)]
pub struct StringMap {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl StringMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite (write lock)
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.data.write().insert(key, value);
    }

    /// Look up a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    /// Remove every listed key under one write lock, returning the number removed
    pub fn remove_all<'a>(&self, keys: impl IntoIterator<Item = &'a [u8]>) -> usize {
        let mut data = self.data.write();
        keys.into_iter()
            .filter(|key| data.remove(*key).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn snapshot(&self) -> HashMap<Bytes, Bytes> {
        self.data.read().clone()
    }
}
