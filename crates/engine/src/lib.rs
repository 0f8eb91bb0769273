//! Engine layer for recstore
//!
//! The [`Environment`] ties the lower layers together:
//! - storage: record store and invalidation state
//! - concurrency: the single-open transaction boundary
//! - subscriptions: batched invalidation notifications
//! - staleness: the cache-or-network verdict for captured results
//!
//! # Quick Start
//!
//! ```
//! use recstore_core::{OperationId, Record, RecordId};
//! use recstore_engine::{Environment, EnvironmentConfig, OperationAvailability};
//!
//! let env = Environment::new(EnvironmentConfig::default()).unwrap();
//! let user = RecordId::new("user:1");
//! let op = OperationId::new("UserQuery");
//!
//! env.commit_payload(op.clone(), vec![Record::new(user.clone(), None)], vec![user.clone()])
//!     .unwrap();
//! assert!(env.check(&op).is_available());
//!
//! env.invalidate_record(user).unwrap();
//! assert!(matches!(env.check(&op), OperationAvailability::Stale(_)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod environment;
pub mod operation;
pub mod staleness;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchMode, EnvironmentConfig};
pub use environment::{CommitReceipt, Environment, EnvironmentStats, InvalidationSubscription};
pub use operation::{decide, FetchDecision, FetchPolicy, OperationAvailability, OperationCapture};
pub use recstore_concurrency::{PendingOperations, TransactionContext, TransactionStatus};
pub use staleness::{is_stale, CapturedAt, StaleReason, StalenessVerdict};
pub use subscription::{
    InvalidationCallback, InvalidationEvent, SubscriptionId, SubscriptionRegistry,
};
