//! Identity types
//!
//! - RecordId: opaque key of one normalized record (e.g. "user:1")
//! - OperationId: key of one committed query result (request + variables)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a normalized record
///
/// Opaque and immutable once assigned. Cheap to clone: the string is
/// shared, so ids can be copied freely into watch sets and epoch maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Arc<str>);

impl RecordId {
    /// Create a record id from any string-like key
    pub fn new(id: impl AsRef<str>) -> Self {
        RecordId(Arc::from(id.as_ref()))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::new(s)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(Arc::from(s))
    }
}

/// Identity of a committed operation result
///
/// Built from the request identifier and its serialized variables, so two
/// executions of the same query with the same variables share one capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Create an operation id from a request name without variables
    pub fn new(request: impl Into<String>) -> Self {
        OperationId(request.into())
    }

    /// Create an operation id from a request name and serialized variables
    pub fn with_variables(request: &str, variables: &serde_json::Value) -> Self {
        OperationId(format!("{}{}", request, variables))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId::new(s)
    }
}
