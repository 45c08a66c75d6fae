//! In-memory document database backend for doclink.
//!
//! This crate provides a [`Connector`](doclink_core::backend::Connector) whose
//! sessions keep BSON documents in process memory behind an async-aware
//! read-write lock. It is meant for development and tests.
//!
//! # Supported behavior
//!
//! - **Filters** - Equality, comparison, `$in`/`$nin`, `$exists` and the logical operators
//! - **Updates** - `$set`, `$unset`, `$inc` and `$setOnInsert`, with upserts
//! - **Indexes** - `_id` and unique indexes are enforced, TTL indexes hide expired documents
//! - **Aggregation** - `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count` and `$lookup`
//!
//! # Quick Start
//!
//! ```ignore
//! use doclink::{prelude::*, memory::InMemoryConnector, bson::doc};
//!
//! let store = DocumentStore::new(InMemoryConnector::new());
//! let jose = store
//!     .insert_one("people", doc! { "givenName": "Jose" }, InsertOptions::default())
//!     .await?;
//! ```

mod evaluator;
mod pipeline;
mod store;
mod update;

pub use store::{InMemoryBackend, InMemoryConnector};
