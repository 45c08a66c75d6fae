//! Convenient re-exports of commonly used types from doclink.
//!
//! ```ignore
//! use doclink::prelude::*;
//! ```

pub use doclink_core::{
    backend::{Connector, DocumentBackend},
    composite::DocumentBatch,
    connection::ConnectionManager,
    document::{DocumentCursor, from_document, to_document},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{DocumentId, IdQuery},
    options::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, IndexCreated, IndexOptions,
        InsertOptions, ReturnDocument,
    },
    query::{Expr, FieldOp, Filter, QueryVisitor},
    store::DocumentStore,
};
