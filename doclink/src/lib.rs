//! Main doclink crate providing a lazily connected document store.
//!
//! This crate is the primary entry point for users of doclink. It re-exports
//! the core types from the sub-crates and gives access to the available
//! backends.
//!
//! # Features
//!
//! - **Lazy connection** - Nothing connects until the first operation, and concurrent first callers share one attempt
//! - **Pass-through operations** - Filters, updates and pipelines use the database's own syntax
//! - **Composite queries** - Lookups by id, concurrent batch lookups and multi-collection searches
//! - **Index helpers** - Unique and TTL indexes in one call
//!
//! # Quick Start
//!
//! ```ignore
//! use doclink::{prelude::*, memory::InMemoryConnector, bson::doc};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryConnector::new());
//!
//!     let jose = store
//!         .insert_one("people", doc! { "givenName": "Jose", "email": "jose@x.io" }, InsertOptions::default())
//!         .await?;
//!     let id = doclink::document::object_id(&jose).unwrap();
//!
//!     store
//!         .find_one_and_update(
//!             "people",
//!             doc! { "_id": id },
//!             doc! { "$set": { "email": "updated@email.com" } },
//!             FindOneAndUpdateOptions::default().return_document(ReturnDocument::After),
//!         )
//!         .await?;
//!
//!     let found = store
//!         .search_collections_for_document_with_id(&["people", "address"], id)
//!         .await?;
//!     println!("Found: {found}");
//!
//!     store.disconnect().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process storage for development and testing
//! - [`mongodb`] - MongoDB through the official driver (requires `mongodb` feature)

pub mod prelude;

pub use doclink_core::{backend, composite, connection, document, error, id, options, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use doclink_memory::{InMemoryBackend, InMemoryConnector};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use doclink_mongodb::{MongoBackend, MongoConnector, MongoConnectorBuilder, open};
}
