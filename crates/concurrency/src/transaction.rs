//! Transaction context for update transactions
//!
//! A TransactionContext buffers everything an update does until commit:
//! record writes, record/global invalidations, and captures of operation
//! results that should be stamped with the commit epoch.
//!
//! # Read-Your-Writes Semantics
//!
//! When reading a record, the transaction checks in order:
//! 1. **write set**: a buffered put is returned, a buffered delete reads as
//!    absent
//! 2. **store**: the committed record
//!
//! # Typed record updates
//!
//! Field updates name the record explicitly (`set_value(id, field, v)`).
//! Each update copies the current view of the record, changes the copy and
//! buffers it as a whole-record put. Nothing outside the transaction can
//! observe the copy.
//!
//! # Lifecycle
//!
//! `Active` → `Committing` → `Committed`, or `Active` → `Aborted`. Every
//! operation on a context that is not `Active` fails with a state error.
//! Dropping an active context aborts it.

use crate::manager::TransactionManager;
use recstore_core::{Error, FieldValue, OperationId, Record, RecordId, Result, Value};
use recstore_storage::{InvalidationBatch, RecordStore, RecordWrite};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Status of a transaction in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting reads, writes and invalidations
    Active,
    /// Buffered work has been handed to the engine for application
    Committing,
    /// Committed; terminal
    Committed,
    /// Aborted; terminal
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// A result to capture at the commit epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCapture {
    /// Operation whose result is being committed
    pub operation: OperationId,
    /// Records the result reads
    pub references: BTreeSet<RecordId>,
    /// Whether the result came from a network round-trip (gets a fetch time)
    pub from_network: bool,
}

/// Everything a transaction buffered, taken out at commit
#[derive(Debug, Clone, Default)]
pub struct CommitSet {
    /// Transaction the work came from
    pub txn_id: u64,
    /// Final write per touched record
    pub writes: Vec<RecordWrite>,
    /// Record and global invalidations
    pub invalidations: InvalidationBatch,
    /// Operation results to capture
    pub captures: Vec<PendingCapture>,
}

impl CommitSet {
    /// True if committing this set changes nothing but the epoch
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.invalidations.is_empty() && self.captures.is_empty()
    }
}

/// Counts of buffered operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Records with a buffered put or delete
    pub writes: usize,
    /// Distinct records invalidated
    pub invalidated_records: usize,
    /// Whether the store was invalidated
    pub global_invalidation: bool,
    /// Operation results to capture
    pub captures: usize,
}

impl PendingOperations {
    /// Number of invalidations, counting a global one as one
    pub fn invalidations(&self) -> usize {
        self.invalidated_records + usize::from(self.global_invalidation)
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.writes == 0 && self.invalidations() == 0 && self.captures == 0
    }
}

/// An open update transaction
#[derive(Debug)]
pub struct TransactionContext {
    txn_id: u64,
    status: TransactionStatus,
    manager: Arc<TransactionManager>,
    store: Arc<RecordStore>,
    writes: FxHashMap<RecordId, RecordWrite>,
    invalidations: InvalidationBatch,
    captures: Vec<PendingCapture>,
}

impl TransactionContext {
    pub(crate) fn new(
        txn_id: u64,
        manager: Arc<TransactionManager>,
        store: Arc<RecordStore>,
    ) -> Self {
        Self {
            txn_id,
            status: TransactionStatus::Active,
            manager,
            store,
            writes: FxHashMap::default(),
            invalidations: InvalidationBatch::new(),
            captures: Vec::new(),
        }
    }

    /// Transaction id, unique within the environment
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current lifecycle status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// True while the transaction accepts operations
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub(crate) fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub(crate) fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    /// Fail with a state error unless the transaction is active
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::state(format!(
                "transaction {} is not active: {:?}",
                self.txn_id, self.status
            )))
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read a record through the write set
    pub fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        self.ensure_active()?;
        Ok(self.view(id))
    }

    /// Check whether a record exists in this transaction's view
    pub fn exists(&self, id: &RecordId) -> Result<bool> {
        self.ensure_active()?;
        Ok(match self.writes.get(id) {
            Some(RecordWrite::Put(_)) => true,
            Some(RecordWrite::Delete(_)) => false,
            None => self.store.contains(id),
        })
    }

    fn view(&self, id: &RecordId) -> Option<Record> {
        match self.writes.get(id) {
            Some(RecordWrite::Put(record)) => Some(record.clone()),
            Some(RecordWrite::Delete(_)) => None,
            None => self.store.get(id),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create an empty record
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if a record with this id already exists.
    pub fn create(&mut self, id: RecordId, typename: Option<String>) -> Result<()> {
        self.ensure_active()?;
        if self.view(&id).is_some() {
            return Err(Error::invalid_record(format!(
                "cannot create record {}: it already exists",
                id
            )));
        }
        self.buffer_put(Record::new(id, typename));
        Ok(())
    }

    /// Return the current record, creating an empty one if absent
    pub fn get_or_create(&mut self, id: RecordId, typename: Option<String>) -> Result<Record> {
        self.ensure_active()?;
        if let Some(record) = self.view(&id) {
            return Ok(record);
        }
        let record = Record::new(id, typename);
        self.buffer_put(record.clone());
        Ok(record)
    }

    /// Insert or replace a whole record
    pub fn set(&mut self, record: Record) -> Result<()> {
        self.ensure_active()?;
        self.buffer_put(record);
        Ok(())
    }

    /// Set a scalar field on an existing record
    pub fn set_value(
        &mut self,
        id: &RecordId,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.update_field(id, field.into(), FieldValue::Scalar(value.into()))
    }

    /// Set a singular link field on an existing record
    pub fn set_link(
        &mut self,
        id: &RecordId,
        field: impl Into<String>,
        target: Option<RecordId>,
    ) -> Result<()> {
        self.update_field(id, field.into(), FieldValue::Link(target))
    }

    /// Set a plural link field on an existing record
    pub fn set_links(
        &mut self,
        id: &RecordId,
        field: impl Into<String>,
        targets: Vec<Option<RecordId>>,
    ) -> Result<()> {
        self.update_field(id, field.into(), FieldValue::Links(targets))
    }

    /// Delete a record; deleting an absent record is allowed
    pub fn delete(&mut self, id: &RecordId) -> Result<()> {
        self.ensure_active()?;
        self.buffer(RecordWrite::Delete(id.clone()));
        Ok(())
    }

    fn update_field(&mut self, id: &RecordId, field: String, value: FieldValue) -> Result<()> {
        self.ensure_active()?;
        let mut record = self.view(id).ok_or_else(|| {
            Error::invalid_record(format!("cannot set field '{}': no record {}", field, id))
        })?;
        record.set_field(field, value);
        self.buffer_put(record);
        Ok(())
    }

    fn buffer_put(&mut self, record: Record) {
        self.buffer(RecordWrite::Put(record));
    }

    fn buffer(&mut self, write: RecordWrite) {
        self.writes.insert(write.id().clone(), write);
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Mark a record invalidated at the commit epoch
    ///
    /// Idempotent within a transaction. The record does not need to exist.
    pub fn invalidate_record(&mut self, id: RecordId) -> Result<()> {
        self.ensure_active()?;
        self.invalidations.invalidate_record(id);
        Ok(())
    }

    /// Mark every previously captured result stale at the commit epoch
    pub fn invalidate_store(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.invalidations.invalidate_global();
        Ok(())
    }

    // =========================================================================
    // Result captures
    // =========================================================================

    /// Capture an operation result at the commit epoch
    ///
    /// `references` are the records the result reads. A result that came
    /// from the network also gets the commit time as its fetch time. A
    /// second capture of the same operation in one transaction replaces the
    /// first.
    pub fn commit_result<I>(
        &mut self,
        operation: OperationId,
        references: I,
        from_network: bool,
    ) -> Result<()>
    where
        I: IntoIterator<Item = RecordId>,
    {
        self.ensure_active()?;
        self.captures.retain(|c| c.operation != operation);
        self.captures.push(PendingCapture {
            operation,
            references: references.into_iter().collect(),
            from_network,
        });
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Counts of buffered operations
    pub fn pending(&self) -> PendingOperations {
        PendingOperations {
            writes: self.writes.len(),
            invalidated_records: self.invalidations.records.len(),
            global_invalidation: self.invalidations.global,
            captures: self.captures.len(),
        }
    }

    pub(crate) fn mark_aborted(&mut self, reason: String) -> Result<()> {
        self.ensure_active()?;
        self.discard();
        self.status = TransactionStatus::Aborted { reason };
        Ok(())
    }

    pub(crate) fn take_commit_set(&mut self) -> CommitSet {
        self.status = TransactionStatus::Committing;
        CommitSet {
            txn_id: self.txn_id,
            writes: self.writes.drain().map(|(_, write)| write).collect(),
            invalidations: std::mem::take(&mut self.invalidations),
            captures: std::mem::take(&mut self.captures),
        }
    }

    fn discard(&mut self) {
        self.writes.clear();
        self.invalidations = InvalidationBatch::new();
        self.captures.clear();
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        match self.status {
            TransactionStatus::Active | TransactionStatus::Committing => {
                let pending = self.pending();
                if !pending.is_empty() {
                    warn!(
                        target: "recstore::txn",
                        txn_id = self.txn_id,
                        writes = pending.writes,
                        invalidations = pending.invalidations(),
                        "Transaction dropped without commit; buffered work discarded"
                    );
                }
                self.discard();
                self.manager.release(self.txn_id);
            }
            TransactionStatus::Committed | TransactionStatus::Aborted { .. } => {}
        }
    }
}
