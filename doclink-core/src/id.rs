//! Document identifiers.
//!
//! Lookups accept either the database's native [`ObjectId`] or its hex string
//! representation. Strings are only validated when the identifier is used, so
//! an invalid string surfaces as [`DocumentStoreError::InvalidId`] from the
//! operation that received it.

use std::fmt;

use bson::{Bson, doc, oid::ObjectId};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// An identifier given by a caller, either native or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    /// A native object identifier.
    ObjectId(ObjectId),
    /// A string expected to hold a 24 character hex object identifier.
    Hex(String),
}

impl DocumentId {
    /// Parses a hex string into a native identifier.
    pub fn parse(value: &str) -> DocumentStoreResult<ObjectId> {
        ObjectId::parse_str(value).map_err(|_| DocumentStoreError::InvalidId(value.to_string()))
    }

    /// Returns `true` if the string is a valid hex object identifier.
    pub fn is_valid(value: &str) -> bool {
        ObjectId::parse_str(value).is_ok()
    }

    /// Resolves this identifier into a native [`ObjectId`].
    pub fn to_object_id(&self) -> DocumentStoreResult<ObjectId> {
        match self {
            DocumentId::ObjectId(oid) => Ok(*oid),
            DocumentId::Hex(value) => Self::parse(value),
        }
    }

    /// Builds the `{ "_id": <id> }` filter used by the by-id helpers.
    pub fn filter(&self) -> DocumentStoreResult<bson::Document> {
        Ok(doc! { "_id": self.to_object_id()? })
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
            DocumentId::Hex(value) => write!(f, "{value}"),
        }
    }
}

impl From<ObjectId> for DocumentId {
    fn from(value: ObjectId) -> Self {
        DocumentId::ObjectId(value)
    }
}

impl From<&ObjectId> for DocumentId {
    fn from(value: &ObjectId) -> Self {
        DocumentId::ObjectId(*value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId::Hex(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        DocumentId::Hex(value)
    }
}

impl From<&String> for DocumentId {
    fn from(value: &String) -> Self {
        DocumentId::Hex(value.clone())
    }
}

impl TryFrom<DocumentId> for Bson {
    type Error = DocumentStoreError;

    fn try_from(value: DocumentId) -> Result<Self, Self::Error> {
        Ok(Bson::ObjectId(value.to_object_id()?))
    }
}

/// One entry of a batch lookup: which collection to search for which id.
#[derive(Debug, Clone, PartialEq)]
pub struct IdQuery {
    /// Collection to search.
    pub collection: String,
    /// Identifier to look for.
    pub id: DocumentId,
}

impl IdQuery {
    /// Creates an entry looking for `id` in `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_strings_resolve_to_the_same_object_id() {
        let oid = ObjectId::new();
        let from_hex = DocumentId::from(oid.to_hex());

        assert_eq!(from_hex.to_object_id().unwrap(), oid);
        assert_eq!(DocumentId::from(oid).to_string(), oid.to_hex());
    }

    #[test]
    fn invalid_strings_are_caller_errors() {
        assert!(!DocumentId::is_valid("not-an-id"));
        assert_eq!(
            DocumentId::from("not-an-id").to_object_id(),
            Err(DocumentStoreError::InvalidId("not-an-id".to_string()))
        );
    }

    #[test]
    fn filter_matches_on_underscore_id() {
        let oid = ObjectId::new();

        assert_eq!(DocumentId::from(&oid).filter().unwrap(), doc! { "_id": oid });
    }
}
