//! Per-height cache of pending writes
//!
//! A write staged by Propose lives here until Commit persists it or a
//! rollback discards it. One entry per height, no eviction.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A staged key/value pair awaiting commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Key to persist on commit
    pub key: String,
    /// Value to persist on commit
    pub value: Vec<u8>,
}

/// In-memory `height -> pending write` map behind a reader/writer lock
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: RwLock<HashMap<u64, PendingWrite>>,
}

impl NodeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write at `height`, replacing any previous entry there
    pub fn set(&self, height: u64, key: &str, value: &[u8]) {
        self.entries.write().insert(
            height,
            PendingWrite {
                key: key.to_string(),
                value: value.to_vec(),
            },
        );
    }

    /// The write staged at `height`, if any
    pub fn get(&self, height: u64) -> Option<PendingWrite> {
        self.entries.read().get(&height).cloned()
    }

    /// Discard the write staged at `height`; no-op if none
    pub fn delete(&self, height: u64) {
        self.entries.write().remove(&height);
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no writes are staged
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
