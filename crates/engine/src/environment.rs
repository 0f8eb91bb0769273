//! Environment: one runtime instance's store, epochs and subscriptions
//!
//! The environment owns every piece of mutable state (record store,
//! invalidation state, transaction manager, subscription registry and
//! operation captures). Nothing is process-global: two environments never
//! share state.
//!
//! ## Commit sequence
//!
//! ```text
//! 1. begin_commit()         Open -> Committing, take buffered work
//! 2. store.apply(writes)    all record writes, under one lock
//! 3. invalidation.apply()   one epoch for the whole commit
//! 4. record captures        stamped with that epoch (+ fetch time)
//! 5. subscriptions.enqueue  one notification per affected subscriber
//! 6. end_commit()           Committing -> Idle
//! 7. dispatch               immediate mode only; no lock held
//! ```
//!
//! Writes are applied before the epoch advances, so anything that observes
//! the new epoch also observes every write of the commit.
//!
//! ## Mutation
//!
//! The record store and invalidation state are private. Records change and
//! epochs advance only through a committed [`TransactionContext`], so every
//! invalidation reaches the subscription registry. Reads go through
//! [`Environment::lookup`], [`Environment::current_epoch`],
//! [`Environment::last_global_invalidation`] and
//! [`Environment::record_invalidated_at`].
//!
//! ```compile_fail
//! use recstore_engine::{Environment, EnvironmentConfig};
//!
//! let env = Environment::new(EnvironmentConfig::default()).unwrap();
//! env.invalidation_state().apply(&Default::default());
//! ```
//!
//! ```compile_fail
//! use recstore_engine::{Environment, EnvironmentConfig};
//!
//! let env = Environment::new(EnvironmentConfig::default()).unwrap();
//! let _txn = env.begin().unwrap();
//! let _store = env.store();
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::{DispatchMode, EnvironmentConfig};
use crate::operation::{decide, FetchDecision, FetchPolicy, OperationAvailability, OperationCapture};
use crate::staleness::{is_stale, CapturedAt, StaleReason, StalenessVerdict};
use crate::subscription::{InvalidationEvent, SubscriptionId, SubscriptionRegistry};
use parking_lot::RwLock;
use recstore_concurrency::{TransactionContext, TransactionManager, TransactionStats};
use recstore_core::{Epoch, Error, OperationId, Record, RecordId, Result};
use recstore_storage::{InvalidationState, RecordStore};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Summary of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Transaction that committed
    pub txn_id: u64,
    /// Epoch assigned to the commit
    pub epoch: Epoch,
    /// Record writes applied
    pub writes: usize,
    /// Distinct records invalidated
    pub invalidated_records: usize,
    /// Whether the store was invalidated
    pub global_invalidation: bool,
    /// Operation results captured
    pub captures: usize,
    /// Subscriber notifications queued
    pub notifications: usize,
}

/// Counters for one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStats {
    /// Transaction counters
    pub transactions: TransactionStats,
    /// Current epoch
    pub epoch: Epoch,
    /// Records in the store
    pub records: usize,
    /// Records carrying an invalidation stamp
    pub invalidated_records: usize,
    /// Captured operation results
    pub operations: usize,
    /// Registered subscriptions
    pub subscriptions: usize,
    /// Notifications waiting for dispatch
    pub pending_notifications: usize,
    /// Callbacks invoked so far
    pub notifications_fired: u64,
}

/// Disposable handle for an invalidation subscription
///
/// Dropping the handle does not unsubscribe; call [`dispose`](Self::dispose).
#[derive(Debug, Clone)]
pub struct InvalidationSubscription {
    id: SubscriptionId,
    registry: Weak<SubscriptionRegistry>,
}

impl InvalidationSubscription {
    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving callbacks, including any already queued
    ///
    /// Safe to call from inside the callback and more than once.
    pub fn dispose(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }

    /// Check whether the subscription is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.is_active(self.id))
            .unwrap_or(false)
    }
}

/// An in-memory record cache with invalidation tracking
#[derive(Debug)]
pub struct Environment {
    config: EnvironmentConfig,
    dispatch: DispatchMode,
    clock: Arc<dyn Clock>,
    store: Arc<RecordStore>,
    invalidation: Arc<InvalidationState>,
    transactions: Arc<TransactionManager>,
    subscriptions: Arc<SubscriptionRegistry>,
    operations: RwLock<FxHashMap<OperationId, OperationCapture>>,
}

impl Environment {
    /// Create an environment using the system clock
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` is invalid.
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an environment reading time from `clock`
    pub fn with_clock(config: EnvironmentConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let dispatch = config.dispatch_mode()?;
        debug!(
            target: "recstore::env",
            expiration_ms = ?config.query_cache_expiration_ms,
            ?dispatch,
            "Environment created"
        );
        Ok(Self {
            config,
            dispatch,
            clock,
            store: Arc::new(RecordStore::new()),
            invalidation: Arc::new(InvalidationState::new()),
            transactions: Arc::new(TransactionManager::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            operations: RwLock::new(FxHashMap::default()),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Current epoch
    pub fn current_epoch(&self) -> Epoch {
        self.invalidation.current_epoch()
    }

    /// Epoch of the most recent global invalidation, if any
    pub fn last_global_invalidation(&self) -> Option<Epoch> {
        self.invalidation.last_global_invalidation()
    }

    /// Epoch at which `id` was last invalidated, `None` if never
    pub fn record_invalidated_at(&self, id: &RecordId) -> Option<Epoch> {
        self.invalidation.epoch_for_record(id)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Open an update transaction
    ///
    /// # Errors
    ///
    /// Returns a state error if a transaction is already open.
    pub fn begin(&self) -> Result<TransactionContext> {
        self.transactions.begin(Arc::clone(&self.store))
    }

    /// Commit a transaction and notify subscribers
    ///
    /// # Errors
    ///
    /// Returns a state error if `txn` is not the active transaction of
    /// this environment.
    pub fn commit(&self, mut txn: TransactionContext) -> Result<CommitReceipt> {
        let set = self.transactions.begin_commit(&mut txn)?;

        let writes = self.store.apply(set.writes);
        let epoch = self.invalidation.apply(&set.invalidations);

        let captures = set.captures.len();
        if captures > 0 {
            let now = self.clock.now();
            let mut operations = self.operations.write();
            for capture in set.captures {
                let captured_at = if capture.from_network {
                    CapturedAt::fetched(epoch, now)
                } else {
                    CapturedAt::local(epoch)
                };
                operations.insert(
                    capture.operation,
                    OperationCapture {
                        captured_at,
                        references: capture.references,
                    },
                );
            }
        }

        let notifications = self.subscriptions.enqueue(&set.invalidations, epoch);
        self.transactions.end_commit(&mut txn);

        debug!(
            target: "recstore::txn",
            txn_id = set.txn_id,
            %epoch,
            writes,
            invalidated = set.invalidations.records.len(),
            global = set.invalidations.global,
            notifications,
            "Transaction committed"
        );

        if self.dispatch == DispatchMode::Immediate {
            self.subscriptions.dispatch();
        }

        Ok(CommitReceipt {
            txn_id: set.txn_id,
            epoch,
            writes,
            invalidated_records: set.invalidations.records.len(),
            global_invalidation: set.invalidations.global,
            captures,
            notifications,
        })
    }

    /// Abort a transaction, discarding its buffered work
    pub fn abort(&self, mut txn: TransactionContext, reason: impl Into<String>) -> Result<()> {
        self.transactions.abort(&mut txn, reason)
    }

    /// Run `f` in a fresh transaction and commit it
    ///
    /// If `f` fails, whatever it buffered before failing is still
    /// committed and the failure is returned as [`Error::PartialCommit`].
    ///
    /// # Errors
    ///
    /// - state error if a transaction is already open
    /// - `PartialCommit` if `f` failed
    pub fn commit_update<F>(&self, f: F) -> Result<CommitReceipt>
    where
        F: FnOnce(&mut TransactionContext) -> Result<()>,
    {
        let mut txn = self.begin()?;
        match f(&mut txn) {
            Ok(()) => self.commit(txn),
            Err(source) => {
                let receipt = self.commit(txn)?;
                error!(
                    target: "recstore::txn",
                    txn_id = receipt.txn_id,
                    epoch = %receipt.epoch,
                    error = %source,
                    "Update failed; completed work was committed"
                );
                Err(Error::PartialCommit {
                    epoch: receipt.epoch,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Commit a network response
    ///
    /// Writes `records` and captures `operation` with the current time as
    /// its fetch time.
    pub fn commit_payload<R, I>(
        &self,
        operation: OperationId,
        records: R,
        references: I,
    ) -> Result<CommitReceipt>
    where
        R: IntoIterator<Item = Record>,
        I: IntoIterator<Item = RecordId>,
    {
        self.commit_update(|txn| {
            for record in records {
                txn.set(record)?;
            }
            txn.commit_result(operation, references, true)
        })
    }

    /// Invalidate the whole store in a single-purpose transaction
    ///
    /// # Errors
    ///
    /// Returns a state error if another transaction is open.
    pub fn invalidate_store(&self) -> Result<CommitReceipt> {
        self.commit_update(|txn| txn.invalidate_store())
    }

    /// Invalidate one record in a single-purpose transaction
    ///
    /// # Errors
    ///
    /// Returns a state error if another transaction is open.
    pub fn invalidate_record(&self, id: RecordId) -> Result<CommitReceipt> {
        self.commit_update(|txn| txn.invalidate_record(id))
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `callback` whenever any of `ids` is invalidated
    ///
    /// Fires at most once per commit. Ids need not exist yet.
    pub fn subscribe_to_invalidation_state<I, F>(
        &self,
        ids: I,
        callback: F,
    ) -> InvalidationSubscription
    where
        I: IntoIterator<Item = RecordId>,
        F: Fn(&InvalidationEvent) + Send + Sync + 'static,
    {
        let id = self
            .subscriptions
            .subscribe(ids, self.current_epoch(), Arc::new(callback));
        InvalidationSubscription {
            id,
            registry: Arc::downgrade(&self.subscriptions),
        }
    }

    /// Invoke queued invalidation callbacks
    ///
    /// Returns the number of callbacks invoked. In immediate mode the queue
    /// is normally empty already.
    pub fn flush_notifications(&self) -> usize {
        self.subscriptions.dispatch()
    }

    // =========================================================================
    // Reads and staleness
    // =========================================================================

    /// Read a committed record
    pub fn lookup(&self, id: &RecordId) -> Option<Record> {
        self.store.get(id)
    }

    /// Capture for the current moment, for callers tracking their own results
    pub fn capture_now(&self, from_network: bool) -> CapturedAt {
        let epoch = self.current_epoch();
        if from_network {
            CapturedAt::fetched(epoch, self.clock.now())
        } else {
            CapturedAt::local(epoch)
        }
    }

    /// The capture recorded for an operation
    pub fn capture(&self, operation: &OperationId) -> Option<OperationCapture> {
        self.operations.read().get(operation).cloned()
    }

    /// Drop the capture of an operation; its records stay in the store
    pub fn forget(&self, operation: &OperationId) -> bool {
        self.operations.write().remove(operation).is_some()
    }

    /// Evaluate a captured result using the configured expiration window
    pub fn is_stale<'a, I>(&self, captured: &CapturedAt, references: I) -> StalenessVerdict
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        is_stale(
            &self.invalidation,
            captured,
            references,
            self.config.expiration(),
            self.clock.now(),
        )
    }

    /// Evaluate an operation's capture; `None` if it was never captured
    pub fn is_operation_stale(&self, operation: &OperationId) -> Option<StalenessVerdict> {
        let capture = self.capture(operation)?;
        Some(self.is_stale(&capture.captured_at, &capture.references))
    }

    /// Check whether cached data can satisfy an operation
    ///
    /// A global invalidation makes the result stale even if records are
    /// gone; otherwise missing records win over record staleness and
    /// expiration.
    pub fn check(&self, operation: &OperationId) -> OperationAvailability {
        let Some(capture) = self.capture(operation) else {
            return OperationAvailability::Missing;
        };

        let verdict = self.is_stale(&capture.captured_at, &capture.references);
        if verdict == StalenessVerdict::Stale(StaleReason::GlobalInvalidation) {
            return OperationAvailability::Stale(StaleReason::GlobalInvalidation);
        }
        if capture.references.iter().any(|id| !self.store.contains(id)) {
            return OperationAvailability::Missing;
        }
        match verdict {
            StalenessVerdict::Fresh => OperationAvailability::Available {
                fetch_time: capture.captured_at.fetch_time,
            },
            StalenessVerdict::Stale(reason) => OperationAvailability::Stale(reason),
        }
    }

    /// Decide between cache and network for an operation
    pub fn decide(&self, operation: &OperationId, policy: FetchPolicy) -> FetchDecision {
        decide(policy, self.check(operation))
    }

    /// Snapshot of the environment counters
    pub fn stats(&self) -> EnvironmentStats {
        EnvironmentStats {
            transactions: self.transactions.stats(),
            epoch: self.current_epoch(),
            records: self.store.len(),
            invalidated_records: self.invalidation.tracked_records(),
            operations: self.operations.read().len(),
            subscriptions: self.subscriptions.len(),
            pending_notifications: self.subscriptions.pending(),
            notifications_fired: self.subscriptions.fired(),
        }
    }
}
