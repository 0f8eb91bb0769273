//! Core types for recstore
//!
//! This crate defines the foundational types used throughout the system:
//! - RecordId: Identity of one normalized record
//! - OperationId: Identity of one committed query result
//! - Record / FieldValue: Normalized entity with scalar and linked fields
//! - Value: Scalar payload stored in record fields
//! - Error: Error type hierarchy
//! - Contract types: Epoch, Timestamp

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod record;
pub mod types;
pub mod value;

pub use contract::{Epoch, Timestamp};
pub use error::{Error, Result};
pub use record::{FieldValue, Record};
pub use types::{OperationId, RecordId};
pub use value::Value;
