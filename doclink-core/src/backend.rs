//! Driver abstraction for the document store.
//!
//! # Overview
//!
//! A [`Connector`] knows how to establish a session with a database service
//! and yields a [`DocumentBackend`] handle for it. The
//! [`ConnectionManager`](crate::connection::ConnectionManager) calls
//! [`Connector::connect`] at most once per connection lifetime and hands
//! clones of the resulting handle to every operation, so handles must be cheap
//! to clone and share (typically a reference-counted client).
//!
//! Backends forward calls to their driver unmodified. Filters, updates,
//! projections and pipelines are documents in the database's own syntax.

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    document::DocumentCursor,
    error::DocumentStoreResult,
    options::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, IndexCreated, IndexOptions,
        InsertOptions,
    },
};

/// An established session with a document database.
///
/// # Thread Safety
///
/// Implementations must be cheap to clone and safe to use from many tasks at
/// once. All clones refer to the same underlying session.
///
/// # Error Handling
///
/// Failures reported by the driver or server are returned as
/// [`DocumentStoreError::Driver`](crate::error::DocumentStoreError::Driver)
/// with the driver's message passed through.
#[async_trait]
pub trait DocumentBackend: Clone + Send + Sync + Debug + 'static {
    /// Inserts one document and returns it as persisted.
    ///
    /// The façade assigns an `_id` before calling this, so the returned
    /// document always carries one.
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: InsertOptions,
    ) -> DocumentStoreResult<Document>;

    /// Selects documents matching `filter` and returns a cursor over them.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Returns the first document matching `filter`, or `None`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Updates the first document matching `filter`.
    ///
    /// Returns the document before or after the update depending on
    /// `options.return_document`, or `None` when nothing matched and no upsert
    /// happened.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Deletes the first document matching `filter` and returns it, or `None`.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Creates an index over `keys`.
    ///
    /// Creating an index identical to an existing one is a no-op that
    /// acknowledges the existing index.
    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> DocumentStoreResult<IndexCreated>;

    /// Runs an aggregation pipeline and returns a cursor over its output.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Closes the session, releasing its resources.
    ///
    /// The default implementation is a no-op.
    async fn close(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Factory for backend sessions.
///
/// Unlike a one-shot builder a connector is kept for the lifetime of the store,
/// so it can connect again after the previous session was released.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Backend: DocumentBackend;

    /// Establishes a new session.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection)
    /// when the service cannot be reached or the configuration is invalid.
    async fn connect(&self) -> DocumentStoreResult<Self::Backend>;
}
