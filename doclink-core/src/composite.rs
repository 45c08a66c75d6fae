//! Convenience operations composed from the [`DocumentStore`] façade.
//!
//! Lookups by id, batch lookups that report per-entry failures, a racing
//! multi-collection search, and index helpers for uniqueness and TTL expiry.

use std::{collections::HashMap, time::Duration};

use bson::{Document, doc, oid::ObjectId};
use futures::{
    FutureExt,
    future::{join_all, select_ok},
};

use crate::{
    backend::Connector,
    document::object_id,
    error::{DocumentStoreError, DocumentStoreResult},
    id::{DocumentId, IdQuery},
    options::{IndexCreated, IndexOptions},
    store::DocumentStore,
};

/// Outcome of [`DocumentStore::get_documents_by_id`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentBatch {
    /// Documents that were found, keyed by their `_id`.
    pub documents: HashMap<ObjectId, Document>,
    /// Failures of the entries that were not found, in no particular order.
    pub errors: Vec<DocumentStoreError>,
}

impl DocumentBatch {
    /// Returns the found document with the given `_id`, if any.
    pub fn get(&self, id: &ObjectId) -> Option<&Document> {
        self.documents.get(id)
    }
}

impl<C: Connector> DocumentStore<C> {
    /// Returns the document whose `_id` equals `id`.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::InvalidId`] when `id` is not a valid identifier,
    /// [`DocumentStoreError::NotFound`] when no such document exists.
    pub async fn get_document_by_id(
        &self,
        collection: &str,
        id: impl Into<DocumentId>,
        projection: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<Document> {
        let filter = id.into().filter()?;

        self.find_one(collection, filter, projection).await
    }

    /// Looks up every `{collection, id}` pair concurrently.
    ///
    /// Never fails as a whole: found documents are keyed by `_id`, every
    /// failed entry contributes its error to [`DocumentBatch::errors`].
    pub async fn get_documents_by_id(
        &self,
        queries: impl IntoIterator<Item = IdQuery>,
    ) -> DocumentBatch {
        let results = join_all(queries.into_iter().map(|query| async move {
            self.get_document_by_id(&query.collection, query.id, None).await
        }))
        .await;

        let mut batch = DocumentBatch::default();
        for result in results {
            match result {
                Ok(document) => match object_id(&document) {
                    Some(oid) => {
                        batch.documents.insert(oid, document);
                    }
                    None => batch.errors.push(DocumentStoreError::Driver(format!(
                        "document without an object id: {document}"
                    ))),
                },
                Err(err) => batch.errors.push(err),
            }
        }

        tracing::debug!(
            found = batch.documents.len(),
            failed = batch.errors.len(),
            "batch lookup finished"
        );

        batch
    }

    /// Searches every listed collection for `id` at once and returns the first hit.
    ///
    /// Outstanding lookups are dropped as soon as one succeeds. When the id
    /// exists in several collections, whichever answers first wins.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::AggregateNotFound`] naming the id and every
    /// collection when no lookup succeeds or `collections` is empty.
    pub async fn search_collections_for_document_with_id<S: AsRef<str> + Sync>(
        &self,
        collections: &[S],
        id: impl Into<DocumentId>,
    ) -> DocumentStoreResult<Document> {
        let id = id.into();
        let not_found = || DocumentStoreError::AggregateNotFound {
            id: id.to_string(),
            collections: collections.iter().map(|c| c.as_ref().to_string()).collect(),
        };

        if collections.is_empty() {
            return Err(not_found());
        }

        let lookups = collections.iter().map(|collection| {
            let id = id.clone();
            async move { self.get_document_by_id(collection.as_ref(), id, None).await }.boxed()
        });

        match select_ok(lookups).await {
            Ok((document, _remaining)) => Ok(document),
            Err(_) => Err(not_found()),
        }
    }

    /// Creates an index that rejects documents with colliding `keys`.
    pub async fn collection_with_unique_indices(
        &self,
        collection: &str,
        keys: Document,
    ) -> DocumentStoreResult<IndexCreated> {
        self.create_index(collection, keys, IndexOptions::default().unique(true))
            .await
    }

    /// Creates a TTL index: the server deletes each document `ttl` after the
    /// time stored in `timestamp_field`.
    pub async fn collection_with_temporary_documents(
        &self,
        collection: &str,
        timestamp_field: &str,
        ttl: Duration,
    ) -> DocumentStoreResult<IndexCreated> {
        self.create_index(
            collection,
            doc! { timestamp_field: 1 },
            IndexOptions::default().expire_after(ttl),
        )
        .await
    }
}
