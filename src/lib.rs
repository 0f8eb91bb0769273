//! recstore - in-memory normalized record cache with epoch-based invalidation
//!
//! recstore is the cache layer of a client-side data-fetching runtime. It
//! stores normalized records, tracks which cached results have been
//! invalidated or have expired, and tells the request dispatcher whether a
//! request can be served from cache.
//!
//! # Quick Start
//!
//! ```
//! use recstore::{Environment, EnvironmentConfig, RecordId};
//!
//! let env = Environment::new(EnvironmentConfig::default()).unwrap();
//! let watched = env.subscribe_to_invalidation_state(vec![RecordId::new("user:1")], |event| {
//!     println!("user:1 invalidated at epoch {}", event.epoch);
//! });
//!
//! env.commit_update(|txn| txn.invalidate_record(RecordId::new("user:1")))
//!     .unwrap();
//! watched.dispose();
//! ```
//!
//! # Architecture
//!
//! All operations go through the [`Environment`]. Storage and transaction
//! internals are reachable through it but are not re-exported here.

pub use recstore_core::{
    Epoch, Error, FieldValue, OperationId, Record, RecordId, Result, Timestamp, Value,
};
pub use recstore_engine::*;
