//! A thin, lazily connected convenience layer over a document database client.
//!
//! This crate is the core of the doclink project and provides:
//!
//! - **Backend abstraction** ([`backend`]) - Traits a driver implements to be used by the store
//! - **Connection lifecycle** ([`connection`]) - Connect-once, shared connection handling
//! - **Document store** ([`store`]) - The façade every operation goes through
//! - **Composite queries** ([`composite`]) - Lookups by id, batch and multi-collection lookups, index helpers
//! - **Identifiers** ([`id`]) - Native or string identifiers
//! - **Options** ([`options`]) - Per-operation option structs
//! - **Filters** ([`query`]) - Optional typed filter construction
//! - **Documents** ([`document`]) - Cursor type and serde helpers
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use doclink::{prelude::*, bson::doc};
//!
//! let store = DocumentStore::new(connector);
//! let person = store
//!     .insert_one("people", doc! { "givenName": "Jose", "email": "jose@x.io" }, InsertOptions::default())
//!     .await?;
//! let id = doclink::document::object_id(&person).unwrap();
//! let same = store.get_document_by_id("people", id, None).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as doclink_core;

pub mod backend;
pub mod composite;
pub mod connection;
pub mod document;
pub mod error;
pub mod id;
pub mod options;
pub mod query;
pub mod store;
