//! Invalidation state: epochs and invalidation stamps
//!
//! ## Model
//!
//! A single counter orders everything. Each committed [`InvalidationBatch`]
//! advances it by exactly one, through [`InvalidationState::apply`]:
//!
//! - every record in the batch is stamped with the new epoch
//! - a global batch records the new epoch as the last global invalidation;
//!   no record is touched, so it is O(1)
//!
//! `apply` is the only mutator. The engine calls it once per commit, so
//! there is no way to advance the epoch without passing through a
//! transaction and notifying subscribers.
//!
//! Record stamps and the global epoch are kept apart so that a reader
//! asking "was there a global invalidation after epoch E" is never fooled
//! by unrelated record invalidations advancing the shared counter.
//!
//! ## Staleness rule
//!
//! A result captured at epoch `E` is stale if the last global invalidation
//! is `> E`, or if any record it references carries a stamp `> E`.

use parking_lot::RwLock;
use recstore_core::{Epoch, RecordId};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::trace;

/// Invalidations accumulated by one transaction
///
/// Ids are kept in a set: invalidating the same id twice in one
/// transaction stamps it once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationBatch {
    /// Records explicitly invalidated
    pub records: BTreeSet<RecordId>,
    /// Whether the whole store was invalidated
    pub global: bool,
}

impl InvalidationBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record invalidation
    pub fn invalidate_record(&mut self, id: RecordId) {
        self.records.insert(id);
    }

    /// Mark the whole store invalidated
    pub fn invalidate_global(&mut self) {
        self.global = true;
    }

    /// True if the batch carries no invalidation at all
    pub fn is_empty(&self) -> bool {
        !self.global && self.records.is_empty()
    }
}

#[derive(Debug, Default)]
struct EpochState {
    current: Epoch,
    last_global: Option<Epoch>,
    records: FxHashMap<RecordId, Epoch>,
}

impl EpochState {
    fn advance(&mut self) -> Epoch {
        self.current = self.current.next();
        self.current
    }
}

/// Epoch counter plus invalidation stamps for one environment
#[derive(Debug, Default)]
pub struct InvalidationState {
    state: RwLock<EpochState>,
}

impl InvalidationState {
    /// Create tracking state at `Epoch::ZERO`
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch
    pub fn current_epoch(&self) -> Epoch {
        self.state.read().current
    }

    /// Epoch of the most recent global invalidation, if any
    pub fn last_global_invalidation(&self) -> Option<Epoch> {
        self.state.read().last_global
    }

    /// Epoch at which `id` was last invalidated, `None` if never
    pub fn epoch_for_record(&self, id: &RecordId) -> Option<Epoch> {
        self.state.read().records.get(id).copied()
    }

    /// Advance the epoch once for a committed transaction
    ///
    /// Every id in the batch is stamped with the returned epoch, and the
    /// global invalidation epoch is set to it if the batch is global. An
    /// empty batch still advances: the epoch doubles as the commit's write
    /// epoch.
    pub fn apply(&self, batch: &InvalidationBatch) -> Epoch {
        let mut state = self.state.write();
        let epoch = state.advance();
        if batch.global {
            state.last_global = Some(epoch);
        }
        for id in &batch.records {
            state.records.insert(id.clone(), epoch);
        }
        trace!(
            target: "recstore::invalidation",
            %epoch,
            global = batch.global,
            records = batch.records.len(),
            "applied invalidation batch"
        );
        epoch
    }

    /// Check whether anything relevant was invalidated after `captured`
    ///
    /// Returns the first offending record in iteration order.
    pub fn invalidated_since<'a, I>(&self, captured: Epoch, ids: I) -> Option<&'a RecordId>
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        let state = self.state.read();
        ids.into_iter()
            .find(|id| matches!(state.records.get(*id), Some(stamp) if *stamp > captured))
    }

    /// Number of records carrying an invalidation stamp
    pub fn tracked_records(&self) -> usize {
        self.state.read().records.len()
    }
}
