//! Two-level hash map
//!
//! Hashes are created implicitly by the first field write and are never
//! removed.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

type Fields = HashMap<Bytes, Bytes>;

/// hash name → (field → value)
#[derive(Default)]
pub struct HashStore {
    data: RwLock<HashMap<Bytes, Fields>>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field, creating the hash if needed (write lock)
    pub fn set(&self, hash: Bytes, field: Bytes, value: Bytes) {
        self.data.write().entry(hash).or_default().insert(field, value);
    }

    /// Read one field (read lock). A missing hash reads like a missing field.
    pub fn get(&self, hash: &[u8], field: &[u8]) -> Option<Bytes> {
        self.data
            .read()
            .get(hash)
            .and_then(|fields| fields.get(field))
            .cloned()
    }

    /// Copy every field of a hash
    ///
    /// The read lock is held for the whole copy, so writers never interleave
    /// with a partially collected result.
    pub fn get_all(&self, hash: &[u8]) -> Vec<(Bytes, Bytes)> {
        let data = self.data.read();
        data.get(hash)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of hashes
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn snapshot(&self) -> HashMap<Bytes, Fields> {
        self.data.read().clone()
    }
}
