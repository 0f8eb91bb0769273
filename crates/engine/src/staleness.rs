//! Staleness evaluation
//!
//! Decides whether a previously committed result may still satisfy a
//! request. Checks run in a fixed order and the first hit wins:
//!
//! 1. a global invalidation after the capture → `GlobalInvalidation`
//! 2. a referenced record invalidated after the capture → `RecordInvalidation`
//! 3. the fetch time is older than the expiration window → `ExpirationElapsed`
//! 4. otherwise `Fresh`
//!
//! The global check compares against the last *global* invalidation epoch,
//! not the shared counter, so record invalidations elsewhere in the store
//! never make an unrelated result stale.

use recstore_core::{Epoch, RecordId, Timestamp};
use recstore_storage::InvalidationState;
use std::time::Duration;

/// When a result was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedAt {
    /// Epoch the result was committed at
    pub epoch: Epoch,
    /// When the result arrived from the network; `None` for local commits
    pub fetch_time: Option<Timestamp>,
}

impl CapturedAt {
    /// A capture with no fetch time (never subject to expiration)
    pub fn local(epoch: Epoch) -> Self {
        Self {
            epoch,
            fetch_time: None,
        }
    }

    /// A capture of a network result fetched at `fetch_time`
    pub fn fetched(epoch: Epoch, fetch_time: Timestamp) -> Self {
        Self {
            epoch,
            fetch_time: Some(fetch_time),
        }
    }
}

/// Why a result is stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The whole store was invalidated after the result was captured
    GlobalInvalidation,
    /// This referenced record was invalidated after the result was captured
    RecordInvalidation(RecordId),
    /// The result was fetched longer ago than the expiration window
    ExpirationElapsed,
}

/// Outcome of a staleness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessVerdict {
    /// The result may be served from cache
    Fresh,
    /// The result must be refetched
    Stale(StaleReason),
}

impl StalenessVerdict {
    /// True for any stale verdict
    pub fn is_stale(&self) -> bool {
        matches!(self, StalenessVerdict::Stale(_))
    }

    /// The reason, if stale
    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            StalenessVerdict::Fresh => None,
            StalenessVerdict::Stale(reason) => Some(reason),
        }
    }
}

/// Evaluate a captured result against invalidation state and the clock
///
/// `expiration` of `None` disables the time check; so does a capture with
/// no fetch time. An empty `references` set leaves only the global and
/// expiration checks.
pub fn is_stale<'a, I>(
    state: &InvalidationState,
    captured: &CapturedAt,
    references: I,
    expiration: Option<Duration>,
    now: Timestamp,
) -> StalenessVerdict
where
    I: IntoIterator<Item = &'a RecordId>,
{
    let last_global = state.last_global_invalidation();
    if matches!(last_global, Some(global) if global > captured.epoch) {
        return StalenessVerdict::Stale(StaleReason::GlobalInvalidation);
    }

    if let Some(id) = state.invalidated_since(captured.epoch, references) {
        return StalenessVerdict::Stale(StaleReason::RecordInvalidation(id.clone()));
    }

    if let (Some(window), Some(fetched)) = (expiration, captured.fetch_time) {
        if u128::from(now.millis_since(fetched)) > window.as_millis() {
            return StalenessVerdict::Stale(StaleReason::ExpirationElapsed);
        }
    }

    StalenessVerdict::Fresh
}
