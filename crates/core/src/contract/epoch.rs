//! Epoch: monotonic ordering marker
//!
//! One epoch is allocated per committed transaction. Everything a commit
//! does (record writes, record invalidations, a global invalidation, the
//! captures of results it stores) is stamped with that same epoch, so
//! "happened after" questions reduce to integer comparisons.
//!
//! ## Invariants
//!
//! - Epochs never decrease and never reset for the life of an environment
//! - `Epoch::ZERO` is the epoch of an environment nothing was committed to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic invalidation/commit epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch before anything was committed
    pub const ZERO: Epoch = Epoch(0);

    /// Create an epoch from a raw counter value
    #[inline]
    pub const fn new(value: u64) -> Self {
        Epoch(value)
    }

    /// Raw counter value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The epoch immediately after this one
    ///
    /// Saturates at `u64::MAX`; at one epoch per commit that is never reached.
    #[inline]
    pub const fn next(&self) -> Self {
        Epoch(self.0.saturating_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Epoch(value)
    }
}
