//! Transaction layer for recstore
//!
//! This crate implements the update transaction boundary:
//! - TransactionContext: buffered record writes, invalidations and result
//!   captures with read-your-writes semantics
//! - TransactionManager: the `Idle -> Open -> Committing -> Idle` state
//!   machine that allows one open transaction per environment
//!
//! Nothing buffered in a transaction is visible outside it until commit.
//! The engine drives commit: it takes the [`CommitSet`] out of the
//! transaction, applies it to storage, and notifies subscribers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;

pub use manager::{TransactionManager, TransactionPhase, TransactionStats};
pub use transaction::{
    CommitSet, PendingCapture, PendingOperations, TransactionContext, TransactionStatus,
};
