//! Errors raised by the cache and document stores.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The backing database could not be opened.
    #[error("Cannot open store: {0}")]
    Connection(String),

    /// A read or write was rejected by the backing database.
    #[error("Store operation failed: {0}")]
    OperationFailed(String),

    /// A stored value does not have the expected shape, or a value could not
    /// be encoded for storage.
    #[error("Stored value is not valid JSON for its type: {0}")]
    Serialization(String),

    /// The schema could not be brought up to date.
    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// The caller passed an unusable key, address or URL.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
