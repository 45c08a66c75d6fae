//! Main document store interface.
//!
//! [`DocumentStore`] is the façade every caller goes through. Each operation
//! resolves the shared connection through its [`ConnectionManager`] and
//! forwards to the backend with the given collection name and parameters.
//! Filters, updates and projections are passed through unmodified.
//!
//! # Example
//!
//! ```ignore
//! use doclink::{prelude::*, bson::doc};
//!
//! let store = DocumentStore::new(connector);
//! let person = store.insert_one("people", doc! { "givenName": "Jose" }, InsertOptions::default()).await?;
//! let found = store.find_one("people", doc! { "givenName": "Jose" }, None).await?;
//! store.disconnect().await?;
//! ```

use bson::{Document, oid::ObjectId};

use crate::{
    backend::{Connector, DocumentBackend},
    connection::ConnectionManager,
    document::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    id::DocumentId,
    options::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, IndexCreated, IndexOptions,
        InsertOptions,
    },
};

/// A lazily connected document store.
///
/// Construction never touches the network; the first operation connects and
/// every later operation reuses that connection until [`disconnect`](Self::disconnect).
#[derive(Debug)]
pub struct DocumentStore<C: Connector> {
    connection: ConnectionManager<C>,
}

impl<C: Connector> DocumentStore<C> {
    /// Creates a new document store that connects through `connector` on first use.
    pub fn new(connector: C) -> Self {
        Self {
            connection: ConnectionManager::new(connector),
        }
    }

    /// Returns the manager owning this store's connection.
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Inserts one document and returns it as persisted, including its `_id`.
    ///
    /// An `ObjectId` is generated when the document has no `_id` yet.
    pub async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
        options: InsertOptions,
    ) -> DocumentStoreResult<Document> {
        tracing::debug!(collection, "insert_one");

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }

        self.connection
            .acquire()
            .await?
            .insert_one(collection, document, options)
            .await
    }

    /// Selects documents matching `query` and returns a cursor over them.
    ///
    /// Zero matches is an empty cursor, not an error.
    pub async fn find(
        &self,
        collection: &str,
        query: Document,
        projection: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<DocumentCursor> {
        self.find_with_options(
            collection,
            query,
            FindOptions {
                projection: projection.into(),
                ..FindOptions::default()
            },
        )
        .await
    }

    /// Like [`find`](Self::find) with sort, skip and limit.
    pub async fn find_with_options(
        &self,
        collection: &str,
        query: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        tracing::debug!(collection, "find");

        self.connection
            .acquire()
            .await?
            .find(collection, query, options)
            .await
    }

    /// Returns the first document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing matches.
    pub async fn find_one(
        &self,
        collection: &str,
        query: Document,
        projection: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<Document> {
        tracing::debug!(collection, "find_one");

        let rendered = query.to_string();

        self.connection
            .acquire()
            .await?
            .find_one(collection, query, projection.into())
            .await?
            .ok_or_else(|| DocumentStoreError::NotFound {
                collection: collection.to_string(),
                query: rendered,
            })
    }

    /// Updates the first document matching `filter`.
    ///
    /// The driver's result is passed through as is: `None` when nothing
    /// matched. Unlike [`find_one`](Self::find_one) this does not fail with
    /// `NotFound`.
    pub async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        tracing::debug!(collection, "find_one_and_update");

        self.connection
            .acquire()
            .await?
            .find_one_and_update(collection, filter, update, options)
            .await
    }

    /// Deletes the first document matching `filter` and returns it, or `None`.
    pub async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        tracing::debug!(collection, "find_one_and_delete");

        self.connection
            .acquire()
            .await?
            .find_one_and_delete(collection, filter, options)
            .await
    }

    /// Creates an index over `keys`, e.g. `doc! { "email": 1 }`.
    pub async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> DocumentStoreResult<IndexCreated> {
        tracing::debug!(collection, keys = %keys, "create_index");

        self.connection
            .acquire()
            .await?
            .create_index(collection, keys, options)
            .await
    }

    /// Runs an aggregation pipeline over `collection`.
    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: impl IntoIterator<Item = Document>,
    ) -> DocumentStoreResult<DocumentCursor> {
        tracing::debug!(collection, "aggregate");

        self.connection
            .acquire()
            .await?
            .aggregate(collection, pipeline.into_iter().collect())
            .await
    }

    /// Inserts a document and returns it with its `_id`.
    pub async fn insert_document(
        &self,
        collection: &str,
        document: Document,
        options: InsertOptions,
    ) -> DocumentStoreResult<Document> {
        self.insert_one(collection, document, options).await
    }

    /// Returns the first document matching `query`, failing with `NotFound`.
    pub async fn get_document(
        &self,
        collection: &str,
        query: Document,
        projection: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<Document> {
        self.find_one(collection, query, projection).await
    }

    /// Returns a cursor over every document matching `query`.
    pub async fn get_documents(
        &self,
        collection: &str,
        query: Document,
        projection: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<DocumentCursor> {
        self.find(collection, query, projection).await
    }

    /// Applies `update` to the document with the given id.
    pub async fn update_document(
        &self,
        collection: &str,
        id: impl Into<DocumentId>,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let filter = id.into().filter()?;

        self.find_one_and_update(collection, filter, update, options).await
    }

    /// Deletes the document with the given id and returns it, or `None`.
    pub async fn delete_document(
        &self,
        collection: &str,
        id: impl Into<DocumentId>,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let filter = id.into().filter()?;

        self.find_one_and_delete(collection, filter, options).await
    }

    /// Returns `true` if `value` is a valid hex object identifier.
    pub fn is_valid_id(value: &str) -> bool {
        DocumentId::is_valid(value)
    }

    /// Closes the connection. Succeeds even if the store never connected.
    ///
    /// Cursors obtained before the call are not drained first. Reading from
    /// one afterwards may fail.
    pub async fn disconnect(&self) -> DocumentStoreResult<()> {
        self.connection.release().await
    }
}
