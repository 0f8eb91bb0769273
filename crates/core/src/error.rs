//! Error types for recstore
//!
//! Structural errors (bad transaction state transitions, malformed writes)
//! always surface to the caller. Unknown record identities are never an
//! error for invalidation or subscription: identity is tracked, not presence.

use crate::contract::Epoch;
use thiserror::Error;

/// Result type alias for recstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for recstore
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction state machine violation
    ///
    /// Opening a transaction while one is open, or operating on a
    /// transaction that is no longer active.
    #[error("State error: {message}")]
    StateError {
        /// What went wrong
        message: String,
    },

    /// An update failed midway; the work completed before the failure was
    /// still committed at `epoch`.
    #[error("Update failed after partial commit at epoch {epoch}: {source}")]
    PartialCommit {
        /// Epoch the partial work was committed at
        epoch: Epoch,
        /// The failure raised by the update
        #[source]
        source: Box<Error>,
    },

    /// Field write against a record that does not exist
    #[error("Invalid record write: {message}")]
    InvalidRecord {
        /// What went wrong
        message: String,
    },

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },
}

impl Error {
    /// Build a [`Error::StateError`]
    pub fn state(message: impl Into<String>) -> Self {
        Error::StateError {
            message: message.into(),
        }
    }

    /// Build an [`Error::InvalidRecord`]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Error::InvalidRecord {
            message: message.into(),
        }
    }

    /// Build an [`Error::Config`]
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// True for state machine violations
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::StateError { .. })
    }
}
