//! Document helpers and the cursor type returned by multi-document reads.
//!
//! Documents are plain [`bson::Document`] values; this layer enforces no
//! schema. The helpers here convert between them and serde types.

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson};
use futures::stream::BoxStream;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A lazy, finite stream over the documents of a result set.
///
/// Consume it with [`futures::TryStreamExt`], e.g. `cursor.try_collect::<Vec<_>>().await`.
pub type DocumentCursor = BoxStream<'static, DocumentStoreResult<Document>>;

/// Serializes a value into a document.
///
/// # Errors
///
/// Returns an error if serialization fails or the value is not a map-like type.
pub fn to_document<T: Serialize>(value: &T) -> DocumentStoreResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(DocumentStoreError::Serialization(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Deserializes a document into a value.
pub fn from_document<T: DeserializeOwned>(document: Document) -> DocumentStoreResult<T> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

/// Converts a document into relaxed extended JSON.
pub fn to_json(document: &Document) -> Value {
    Bson::Document(document.clone()).into_relaxed_extjson()
}

/// Returns the document's `_id` when it is a native object identifier.
pub fn object_id(document: &Document) -> Option<ObjectId> {
    match document.get("_id") {
        Some(Bson::ObjectId(oid)) => Some(*oid),
        _ => None,
    }
}
