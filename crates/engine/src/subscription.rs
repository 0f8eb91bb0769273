//! Invalidation subscriptions and the notification queue
//!
//! ## Flow
//!
//! ```text
//! commit ──enqueue(batch, epoch)──► queue ──dispatch()──► callbacks
//! ```
//!
//! `enqueue` runs once per commit. It picks every subscription whose
//! watched ids intersect the commit's invalidated ids (every subscription,
//! if the commit invalidated the whole store) and queues one notification
//! for each. `dispatch` drains the queue, invoking each callback with no
//! lock held, so callbacks may subscribe, unsubscribe, commit, or dispatch
//! again.
//!
//! A subscription removed before its queued notification is drained is
//! skipped.

use parking_lot::Mutex;
use recstore_core::{Epoch, RecordId};
use recstore_storage::InvalidationBatch;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Callback invoked when a watched record is invalidated
pub type InvalidationCallback = Arc<dyn Fn(&InvalidationEvent) + Send + Sync>;

/// Handle identifying one registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a subscriber is told when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    /// Epoch of the commit that invalidated
    pub epoch: Epoch,
    /// Whether the commit invalidated the whole store
    pub global: bool,
    /// Watched ids the commit invalidated explicitly
    pub records: SmallVec<[RecordId; 4]>,
}

struct Subscription {
    ids: BTreeSet<RecordId>,
    baseline: Epoch,
    callback: InvalidationCallback,
}

struct Notification {
    subscription: SubscriptionId,
    event: InvalidationEvent,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    queue: VecDeque<Notification>,
}

/// Registry of invalidation subscriptions for one environment
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
    fired: AtomicU64,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &state.subscriptions.len())
            .field("queued", &state.queue.len())
            .field("fired", &self.fired.load(Ordering::Relaxed))
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `ids`
    ///
    /// `baseline` is the current epoch: only commits after it can fire
    /// the subscription. Ids need not exist in the store.
    pub fn subscribe<I>(
        &self,
        ids: I,
        baseline: Epoch,
        callback: InvalidationCallback,
    ) -> SubscriptionId
    where
        I: IntoIterator<Item = RecordId>,
    {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        let ids: BTreeSet<RecordId> = ids.into_iter().collect();
        trace!(target: "recstore::notify", subscription = %id, watched = ids.len(), "subscribed");
        state.subscriptions.insert(
            id,
            Subscription {
                ids,
                baseline,
                callback,
            },
        );
        id
    }

    /// Remove a subscription and any notification still queued for it
    ///
    /// Returns false if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let removed = state.subscriptions.remove(&id).is_some();
        if removed {
            state.queue.retain(|n| n.subscription != id);
            trace!(target: "recstore::notify", subscription = %id, "unsubscribed");
        }
        removed
    }

    /// Check whether a subscription is still registered
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscriptions.contains_key(&id)
    }

    /// Queue one notification per affected subscription for a commit
    ///
    /// Returns the number of notifications queued.
    pub fn enqueue(&self, batch: &InvalidationBatch, epoch: Epoch) -> usize {
        if batch.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        let RegistryState {
            subscriptions,
            queue,
            ..
        } = &mut *state;

        let mut queued = 0;
        for (id, subscription) in subscriptions.iter_mut() {
            if subscription.baseline >= epoch {
                continue;
            }
            let records: SmallVec<[RecordId; 4]> = subscription
                .ids
                .intersection(&batch.records)
                .cloned()
                .collect();
            if !batch.global && records.is_empty() {
                continue;
            }
            subscription.baseline = epoch;
            queue.push_back(Notification {
                subscription: *id,
                event: InvalidationEvent {
                    epoch,
                    global: batch.global,
                    records,
                },
            });
            queued += 1;
        }

        if queued > 0 {
            debug!(target: "recstore::notify", %epoch, queued, "queued invalidation notifications");
        }
        queued
    }

    /// Invoke every queued notification
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self) -> usize {
        let mut invoked = 0;
        while let Some((callback, event)) = self.next_ready() {
            callback(&event);
            invoked += 1;
        }
        if invoked > 0 {
            self.fired.fetch_add(invoked as u64, Ordering::Relaxed);
        }
        invoked
    }

    fn next_ready(&self) -> Option<(InvalidationCallback, InvalidationEvent)> {
        let mut state = self.state.lock();
        while let Some(notification) = state.queue.pop_front() {
            if let Some(subscription) = state.subscriptions.get(&notification.subscription) {
                return Some((Arc::clone(&subscription.callback), notification.event));
            }
        }
        None
    }

    /// Number of registered subscriptions
    pub fn len(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Check if no subscription is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifications waiting for dispatch
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Total callbacks invoked
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}
