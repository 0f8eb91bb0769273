//! Transaction manager: one open transaction per environment
//!
//! ## State machine
//!
//! ```text
//! Idle --begin()--> Open --begin_commit()--> Committing --end_commit()--> Idle
//!                    |
//!                    +--abort() / drop--> Idle
//! ```
//!
//! `begin()` outside `Idle` fails with a state error. Nested transactions
//! are not supported; callers coalesce their work into one transaction.
//!
//! # Memory Ordering
//!
//! The phase lives behind a mutex. The metric counters use Relaxed
//! ordering: they are observational only and synchronize nothing.

use crate::transaction::{CommitSet, TransactionContext, TransactionStatus};
use parking_lot::Mutex;
use recstore_core::{Error, Result};
use recstore_storage::RecordStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the environment is in the transaction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// No transaction open
    Idle,
    /// A transaction is open and accepting operations
    Open {
        /// The open transaction
        txn_id: u64,
    },
    /// A transaction is being applied to storage
    Committing {
        /// The committing transaction
        txn_id: u64,
    },
}

impl TransactionPhase {
    /// The open or committing transaction, if any
    pub fn txn_id(&self) -> Option<u64> {
        match *self {
            TransactionPhase::Idle => None,
            TransactionPhase::Open { txn_id } => Some(txn_id),
            TransactionPhase::Committing { txn_id } => Some(txn_id),
        }
    }
}

/// Transaction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    /// Transactions started
    pub started: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions aborted or dropped uncommitted
    pub aborted: u64,
}

/// Coordinates transaction lifecycle for one environment
#[derive(Debug)]
pub struct TransactionManager {
    phase: Mutex<TransactionPhase>,
    next_txn_id: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl TransactionManager {
    /// Create an idle manager
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(TransactionPhase::Idle),
            next_txn_id: AtomicU64::new(1),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> TransactionPhase {
        *self.phase.lock()
    }

    /// True if no transaction is open or committing
    pub fn is_idle(&self) -> bool {
        self.phase() == TransactionPhase::Idle
    }

    /// Open a transaction reading from `store`
    ///
    /// # Errors
    ///
    /// Returns a state error if another transaction is open or committing.
    pub fn begin(self: &Arc<Self>, store: Arc<RecordStore>) -> Result<TransactionContext> {
        let txn_id = {
            let mut phase = self.phase.lock();
            match *phase {
                TransactionPhase::Idle => {}
                TransactionPhase::Open { txn_id } => {
                    return Err(Error::state(format!(
                        "cannot begin a transaction while transaction {} is open",
                        txn_id
                    )));
                }
                TransactionPhase::Committing { txn_id } => {
                    return Err(Error::state(format!(
                        "cannot begin a transaction while transaction {} is committing",
                        txn_id
                    )));
                }
            }
            let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
            *phase = TransactionPhase::Open { txn_id };
            txn_id
        };

        self.total_started.fetch_add(1, Ordering::Relaxed);
        debug!(target: "recstore::txn", txn_id, "Transaction started");

        Ok(TransactionContext::new(txn_id, Arc::clone(self), store))
    }

    /// Move an open transaction to `Committing` and take its buffered work
    ///
    /// # Errors
    ///
    /// Returns a state error if `txn` is not active, belongs to another
    /// manager, or is not the transaction currently open.
    pub fn begin_commit(&self, txn: &mut TransactionContext) -> Result<CommitSet> {
        txn.ensure_active()?;
        self.ensure_owned(txn)?;

        let mut phase = self.phase.lock();
        match *phase {
            TransactionPhase::Open { txn_id } if txn_id == txn.txn_id() => {
                *phase = TransactionPhase::Committing { txn_id };
            }
            other => {
                return Err(Error::state(format!(
                    "transaction {} cannot commit in phase {:?}",
                    txn.txn_id(),
                    other
                )));
            }
        }
        drop(phase);

        Ok(txn.take_commit_set())
    }

    /// Finish a commit started with [`begin_commit`](Self::begin_commit)
    ///
    /// Returns the manager to `Idle` and marks `txn` committed.
    pub fn end_commit(&self, txn: &mut TransactionContext) {
        {
            let txn_id = txn.txn_id();
            let mut phase = self.phase.lock();
            if *phase == (TransactionPhase::Committing { txn_id }) {
                *phase = TransactionPhase::Idle;
            }
        }
        txn.set_status(TransactionStatus::Committed);
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Explicitly abort a transaction, discarding its buffered work
    ///
    /// # Errors
    ///
    /// Returns a state error if `txn` is not active or belongs to another
    /// manager.
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) -> Result<()> {
        self.ensure_owned(txn)?;
        let reason = reason.into();
        let pending = txn.pending();
        txn.mark_aborted(reason.clone())?;
        if !pending.is_empty() {
            warn!(
                target: "recstore::txn",
                txn_id = txn.txn_id(),
                writes = pending.writes,
                invalidations = pending.invalidations(),
                reason = %reason,
                "Transaction aborted with pending operations"
            );
        }
        self.release(txn.txn_id());
        Ok(())
    }

    fn ensure_owned(&self, txn: &TransactionContext) -> Result<()> {
        if std::ptr::eq(Arc::as_ptr(txn.manager()), self) {
            Ok(())
        } else {
            Err(Error::state(format!(
                "transaction {} belongs to a different environment",
                txn.txn_id()
            )))
        }
    }

    /// Return to `Idle` if `txn_id` is the open or committing transaction
    pub(crate) fn release(&self, txn_id: u64) {
        let mut phase = self.phase.lock();
        if phase.txn_id() == Some(txn_id) {
            *phase = TransactionPhase::Idle;
            self.total_aborted.fetch_add(1, Ordering::Relaxed);
            debug!(target: "recstore::txn", txn_id, "Transaction released");
        }
    }

    /// Snapshot of the transaction counters
    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            started: self.total_started.load(Ordering::Relaxed),
            committed: self.total_committed.load(Ordering::Relaxed),
            aborted: self.total_aborted.load(Ordering::Relaxed),
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
