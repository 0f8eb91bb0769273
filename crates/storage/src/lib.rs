//! Storage layer for recstore
//!
//! This crate holds the two pieces of per-environment state:
//! - RecordStore: normalized records keyed by identity (pure storage)
//! - InvalidationState: the epoch counter, per-record invalidation stamps
//!   and the last global invalidation epoch
//!
//! Neither type knows about transactions; the concurrency layer batches
//! writes and invalidations and applies them here in one step per commit.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod invalidation;
pub mod store;

pub use invalidation::{InvalidationBatch, InvalidationState};
pub use store::{RecordStore, RecordWrite};
