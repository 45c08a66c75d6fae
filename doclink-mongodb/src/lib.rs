//! MongoDB backend implementation for doclink.
//!
//! This crate provides a [`Connector`](doclink_core::backend::Connector) over the
//! official MongoDB driver. Filters, updates and pipelines are passed to the
//! server untouched, in MongoDB's own syntax.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! doclink = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Configuration is a single connection string. The database named in the
//! URL is used unless the builder names another one. Nothing connects until
//! the first operation, which pings the server so an unreachable deployment
//! surfaces as a `Connection` error.
//!
//! # Example
//!
//! ```ignore
//! use doclink::{bson::doc, mongodb::MongoConnector, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(
//!         MongoConnector::builder("mongodb://localhost:27017")
//!             .database("people")
//!             .max_pool_size(20)
//!             .build(),
//!     );
//!
//!     store.find_one("people", doc! { "givenName": "Jose" }, None).await?;
//!     store.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doclink_mongodb;

pub mod store;

pub use store::{MongoBackend, MongoConnector, MongoConnectorBuilder, open};
