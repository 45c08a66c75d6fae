//! Per-operation option structs.
//!
//! These are translated by each backend into its driver's own option types.
//! Every struct is `Default`, and the chainable setters allow building one
//! inline:
//!
//! ```ignore
//! use doclink::options::{FindOptions, IndexOptions};
//! use std::time::Duration;
//!
//! let find = FindOptions::default().limit(10).sort(doc! { "createdAt": -1 });
//! let ttl = IndexOptions::default().expire_after(Duration::from_secs(3600));
//! ```

use std::time::Duration;

use bson::Document;

/// Options for [`insert_one`](crate::store::DocumentStore::insert_one).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOptions {
    /// Skip server-side schema validation for this write.
    pub bypass_document_validation: Option<bool>,
}

/// Options for [`find_with_options`](crate::store::DocumentStore::find_with_options).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    /// Sets the projection applied to returned documents.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Sets the sort order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Skips this many matching documents.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Returns at most this many documents.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Which version of the document a find-and-modify returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    /// The document as it was before the update.
    #[default]
    Before,
    /// The document as it is after the update.
    After,
}

/// Options for [`find_one_and_update`](crate::store::DocumentStore::find_one_and_update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub return_document: ReturnDocument,
    /// Insert a new document when nothing matches the filter.
    pub upsert: bool,
    pub projection: Option<Document>,
    /// Picks which document is updated when several match.
    pub sort: Option<Document>,
}

impl FindOneAndUpdateOptions {
    /// Chooses whether the document before or after the update is returned.
    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = return_document;
        self
    }

    /// Inserts a document when nothing matches.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Sets the projection applied to returned documents.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Sets the sort order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Options for [`find_one_and_delete`](crate::store::DocumentStore::find_one_and_delete).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndDeleteOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

impl FindOneAndDeleteOptions {
    /// Sets the projection applied to returned documents.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Sets the sort order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Options for [`create_index`](crate::store::DocumentStore::create_index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    /// Reject documents whose indexed key collides with an existing one.
    pub unique: bool,
    /// Only index documents that contain the indexed fields.
    pub sparse: bool,
    /// Let the server delete documents this long after the indexed timestamp.
    pub expire_after: Option<Duration>,
    /// Explicit index name. The server derives one from the keys when absent.
    pub name: Option<String>,
}

impl IndexOptions {
    /// Makes the index reject colliding keys.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Only indexes documents that have the indexed fields.
    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    /// Expires documents this long after their indexed timestamp.
    pub fn expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }

    /// Names the index explicitly.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Acknowledgement returned once an index exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCreated {
    /// Name of the index, as given or as derived by the server.
    pub name: String,
}

/// Derives the server's default index name, e.g. `{ email: 1, age: -1 }` → `email_1_age_-1`.
pub fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, direction)| format!("{field}_{}", index_direction(direction)))
        .collect::<Vec<_>>()
        .join("_")
}

fn index_direction(value: &bson::Bson) -> String {
    match value {
        bson::Bson::Int32(v) => v.to_string(),
        bson::Bson::Int64(v) => v.to_string(),
        bson::Bson::Double(v) => (*v as i64).to_string(),
        bson::Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn default_index_names_follow_server_convention() {
        assert_eq!(default_index_name(&doc! { "email": 1 }), "email_1");
        assert_eq!(default_index_name(&doc! { "email": 1, "age": -1 }), "email_1_age_-1");
        assert_eq!(default_index_name(&doc! { "body": "text" }), "body_text");
    }

    #[test]
    fn setters_chain() {
        let options = IndexOptions::default()
            .unique(true)
            .expire_after(Duration::from_secs(10));

        assert!(options.unique);
        assert_eq!(options.expire_after, Some(Duration::from_secs(10)));
        assert_eq!(options.name, None);
    }
}
