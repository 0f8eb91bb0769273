//! Normalized records
//!
//! A record is a flat map from field key to either a scalar [`Value`] or a
//! link to other records by [`RecordId`]. Records are replaced wholesale in
//! the store; field updates happen on a copy inside a transaction.

use crate::types::RecordId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content of one record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Scalar value
    Scalar(Value),
    /// Link to a single record (or to nothing, for a null link)
    Link(Option<RecordId>),
    /// Plural link; individual entries may be null
    Links(Vec<Option<RecordId>>),
}

impl FieldValue {
    /// Iterate over every record id this field links to
    pub fn linked_ids(&self) -> impl Iterator<Item = &RecordId> {
        let ids: Box<dyn Iterator<Item = &RecordId>> = match self {
            FieldValue::Scalar(_) => Box::new(std::iter::empty()),
            FieldValue::Link(link) => Box::new(link.iter()),
            FieldValue::Links(links) => Box::new(links.iter().flatten()),
        };
        ids
    }
}

/// A normalized entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    typename: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new(id: RecordId, typename: Option<String>) -> Self {
        Self {
            id,
            typename,
            fields: BTreeMap::new(),
        }
    }

    /// Record identity
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Type name, if known
    pub fn typename(&self) -> Option<&str> {
        self.typename.as_deref()
    }

    /// Get a raw field
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get a scalar field
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            Some(FieldValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    /// Get a singular link field
    pub fn linked_record(&self, key: &str) -> Option<&RecordId> {
        match self.fields.get(key) {
            Some(FieldValue::Link(link)) => link.as_ref(),
            _ => None,
        }
    }

    /// Get a plural link field
    pub fn linked_records(&self, key: &str) -> Option<&[Option<RecordId>]> {
        match self.fields.get(key) {
            Some(FieldValue::Links(links)) => Some(links),
            _ => None,
        }
    }

    /// Set a field, returning the previous content
    pub fn set_field(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(key.into(), value)
    }

    /// Set a scalar field
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), FieldValue::Scalar(value.into()));
    }

    /// Remove a field
    pub fn remove_field(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Iterate over fields in key order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every record id reachable in one hop from this record
    pub fn references(&self) -> impl Iterator<Item = &RecordId> {
        self.fields.values().flat_map(FieldValue::linked_ids)
    }
}
