//! In-memory ordered snapshot backed by a `BTreeMap`.
//!
//! Iterates in byte-wise key order, the same order redb uses for `&[u8]`
//! keys. All data is lost on process exit.

use std::collections::BTreeMap;

use super::{EntryVisitor, Snapshot, StoreResult};

/// Ordered in-memory snapshot.
#[derive(Debug, Default, Clone)]
pub struct MemSnapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(key, value)` pairs. Later duplicates replace earlier ones.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let data = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_vec(), v.as_ref().to_vec()))
            .collect();
        Self { data }
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.data.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

impl Snapshot for MemSnapshot {
    fn scan(&self, visit: &mut EntryVisitor<'_>) -> StoreResult<()> {
        for (key, value) in &self.data {
            if visit(key, value).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn origin(&self) -> String {
        format!("memory ({} entries)", self.data.len())
    }
}
