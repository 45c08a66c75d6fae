//! Error types and result types for document store operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//! Errors are `Clone` because a single connection attempt may be awaited by
//! many callers, and every one of them receives the same failure.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// Establishing the connection to the database service failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A single-document lookup matched zero documents.
    #[error("Query into '{collection}' collection returned no documents: {query}")]
    NotFound {
        /// The collection that was queried.
        collection: String,
        /// The rendered filter that matched nothing.
        query: String,
    },
    /// Any other failure reported by the underlying driver or server.
    #[error("{0}")]
    Driver(String),
    /// Every branch of a multi-collection lookup failed.
    #[error("Document {id} not found in collections: {}", collections.join(","))]
    AggregateNotFound {
        /// The identifier that was searched for.
        id: String,
        /// Every collection that was searched.
        collections: Vec<String>,
    },
    /// An identifier string could not be converted into a native identifier.
    #[error("Invalid document id: {0}")]
    InvalidId(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DocumentStoreError {
    /// Returns `true` for both single and multi-collection not-found failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::NotFound { .. } | DocumentStoreError::AggregateNotFound { .. }
        )
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_not_found_names_id_and_collections() {
        let err = DocumentStoreError::AggregateNotFound {
            id: "abc".to_string(),
            collections: vec!["x".to_string(), "y".to_string(), "people".to_string()],
        };

        assert_eq!(err.to_string(), "Document abc not found in collections: x,y,people");
        assert!(err.is_not_found());
    }

    #[test]
    fn driver_errors_are_not_not_found() {
        assert!(!DocumentStoreError::Driver("E11000 duplicate key".into()).is_not_found());
        assert!(!DocumentStoreError::Connection("refused".into()).is_not_found());
    }
}
