//! Operation captures and fetch decisions
//!
//! When a query result is committed, the environment records a capture:
//! the commit epoch, the fetch time (for network results) and the records
//! the result reads. Later requests for the same operation are checked
//! against the capture to decide between cache and network.

use crate::staleness::{CapturedAt, StaleReason};
use recstore_core::{RecordId, Timestamp};
use std::collections::BTreeSet;

/// Capture of one committed operation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCapture {
    /// When the result was committed
    pub captured_at: CapturedAt,
    /// Records the result reads
    pub references: BTreeSet<RecordId>,
}

/// Whether a cached result can satisfy a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationAvailability {
    /// Cached data is complete and fresh
    Available {
        /// When the data was fetched, if it came from the network
        fetch_time: Option<Timestamp>,
    },
    /// Cached data is complete but must not be trusted
    Stale(StaleReason),
    /// No capture, or a referenced record is gone
    Missing,
}

impl OperationAvailability {
    /// True only for `Available`
    pub fn is_available(&self) -> bool {
        matches!(self, OperationAvailability::Available { .. })
    }
}

/// How a request uses the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve fresh cached data; otherwise go to the network
    #[default]
    StoreOrNetwork,
    /// Serve any complete cached data and always refresh from the network
    StoreAndNetwork,
    /// Always go to the network
    NetworkOnly,
    /// Never go to the network
    StoreOnly,
}

/// What the request dispatcher should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDecision {
    /// Render cached data now
    pub serve_from_cache: bool,
    /// Issue a network request
    pub network_request: bool,
    /// Availability the decision was based on
    pub availability: OperationAvailability,
}

/// Combine a fetch policy with an availability check
pub fn decide(policy: FetchPolicy, availability: OperationAvailability) -> FetchDecision {
    let complete = !matches!(availability, OperationAvailability::Missing);
    let (serve_from_cache, network_request) = match policy {
        FetchPolicy::StoreOrNetwork => {
            let fresh = availability.is_available();
            (fresh, !fresh)
        }
        FetchPolicy::StoreAndNetwork => (complete, true),
        FetchPolicy::NetworkOnly => (false, true),
        FetchPolicy::StoreOnly => (complete, false),
    };
    FetchDecision {
        serve_from_cache,
        network_request,
        availability,
    }
}
