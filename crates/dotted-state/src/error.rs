//! Error types for dotted-state

use thiserror::Error;

/// Errors that can occur while addressing documents or managing the store connection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// A sub-path write was attempted against a document root that cannot be traversed
    #[error("Cannot target non-object: {key}")]
    Target { key: String },

    /// Transport failure reported by the store driver
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Document operation on a handle that has not finished connecting
    #[error("Database is not connected")]
    NotConnected,

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Collection name cannot be used as a table identifier
    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
