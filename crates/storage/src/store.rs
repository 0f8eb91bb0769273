//! Record store: normalized records keyed by identity
//!
//! # Design
//!
//! - FxHashMap behind a parking_lot RwLock: O(1) lookups, shared via `Arc`
//! - Records are owned by the store and handed out as clones
//! - Writes replace whole records; there is no in-place field mutation
//! - `apply` is the only writer: it installs a whole commit under one lock
//!   so readers never observe half of a transaction

use parking_lot::RwLock;
use recstore_core::{Record, RecordId};
use rustc_hash::FxHashMap;

/// One buffered write produced by a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    /// Insert or replace a record
    Put(Record),
    /// Remove a record
    Delete(RecordId),
}

impl RecordWrite {
    /// The record id this write targets
    pub fn id(&self) -> &RecordId {
        match self {
            RecordWrite::Put(record) => record.id(),
            RecordWrite::Delete(id) => id,
        }
    }
}

/// In-memory record store
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<FxHashMap<RecordId, Record>>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of a record
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().get(id).cloned()
    }

    /// Check whether a record exists
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.read().contains_key(id)
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Apply a batch of writes atomically
    ///
    /// Returns the number of writes applied. Deletes of absent records
    /// count as applied.
    pub fn apply<I>(&self, writes: I) -> usize
    where
        I: IntoIterator<Item = RecordWrite>,
    {
        let mut records = self.records.write();
        let mut applied = 0;
        for write in writes {
            match write {
                RecordWrite::Put(record) => {
                    records.insert(record.id().clone(), record);
                }
                RecordWrite::Delete(id) => {
                    records.remove(&id);
                }
            }
            applied += 1;
        }
        applied
    }
}
