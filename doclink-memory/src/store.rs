//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON documents per collection behind an async-safe
//! read-write lock. Every connection handed out by [`InMemoryConnector`] is a
//! separate session over the same data, so data outlives a disconnect the way
//! it would on a server.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use uuid::Uuid;

use doclink_core::{
    backend::{Connector, DocumentBackend},
    document::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    options::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, IndexCreated, IndexOptions,
        InsertOptions, ReturnDocument, default_index_name,
    },
    query::{Expr, FieldOp},
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents, lookup, sort_keys},
    pipeline::{self, LookupSource},
    update::{apply_update, project, set_path, validate_update},
};

#[derive(Debug, Clone, PartialEq)]
struct MemoryIndex {
    name: String,
    keys: Document,
    options: IndexOptions,
}

impl MemoryIndex {
    fn key_of(&self, document: &Document) -> Option<Vec<Bson>> {
        let values = self
            .keys
            .keys()
            .map(|field| lookup(document, field).cloned())
            .collect::<Vec<_>>();

        if self.options.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        Some(values.into_iter().map(|v| v.unwrap_or(Bson::Null)).collect())
    }

    fn is_expired(&self, document: &Document, now: DateTime<Utc>) -> bool {
        let (Some(ttl), Some(field)) = (self.options.expire_after, self.keys.keys().next()) else {
            return false;
        };

        match (lookup(document, field), chrono::Duration::from_std(ttl)) {
            (Some(Bson::DateTime(stamp)), Ok(ttl)) => stamp.to_chrono() + ttl <= now,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    indexes: Vec<MemoryIndex>,
}

impl MemoryCollection {
    fn is_live(&self, document: &Document, now: DateTime<Utc>) -> bool {
        !self.indexes.iter().any(|index| index.is_expired(document, now))
    }

    fn live_documents(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(move |document| self.is_live(document, now))
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let indexes = &self.indexes;
        self.documents
            .retain(|document| !indexes.iter().any(|index| index.is_expired(document, now)));
    }

    /// Positions of the live documents matching `filter`, in `sort` order when given.
    fn select(
        &self,
        filter: &Expr,
        sort: Option<&Document>,
        now: DateTime<Utc>,
    ) -> DocumentStoreResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in self.documents.iter().enumerate() {
            if self.is_live(document, now) && DocumentEvaluator::matches(document, filter)? {
                positions.push(position);
            }
        }

        if let Some(sort) = sort {
            let keys = sort_keys(sort)?;
            positions.sort_by(|&a, &b| {
                compare_documents(&self.documents[a], &self.documents[b], &keys)
            });
        }

        Ok(positions)
    }

    fn others(&self, replacing: Option<usize>) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .enumerate()
            .filter(move |(position, _)| Some(*position) != replacing)
            .map(|(_, document)| document)
    }

    /// Rejects `candidate` if it collides on `_id` or any unique index with
    /// a document other than the one at `replacing`.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        replacing: Option<usize>,
    ) -> DocumentStoreResult<()> {
        if let Some(id) = candidate.get("_id") {
            if self.others(replacing).any(|document| document.get("_id") == Some(id)) {
                return Err(duplicate_key(collection, "_id_", &doc! { "_id": id.clone() }));
            }
        }

        for index in self.indexes.iter().filter(|index| index.options.unique) {
            let Some(key) = index.key_of(candidate) else {
                continue;
            };

            if self.others(replacing).any(|document| index.key_of(document).as_ref() == Some(&key)) {
                let dup = index
                    .keys
                    .keys()
                    .cloned()
                    .zip(key)
                    .collect::<Document>();

                return Err(duplicate_key(collection, &index.name, &dup));
            }
        }

        Ok(())
    }
}

fn duplicate_key(collection: &str, index: &str, key: &Document) -> DocumentStoreError {
    DocumentStoreError::Driver(format!(
        "E11000 duplicate key error collection: {collection} index: {index} dup key: {key}"
    ))
}

type StoreMap = HashMap<String, MemoryCollection>;

struct Snapshot<'a> {
    store: &'a StoreMap,
    now: DateTime<Utc>,
}

impl LookupSource for Snapshot<'_> {
    fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .get(collection)
            .map(|c| c.live_documents(self.now).cloned().collect())
            .unwrap_or_default()
    }
}

/// Seed document for an upsert: the filter's top-level equality conditions.
fn upsert_seed(filter: &Expr) -> DocumentStoreResult<Document> {
    let mut seed = Document::new();
    let conditions = match filter {
        Expr::And(exprs) => exprs.iter().collect::<Vec<_>>(),
        single => vec![single],
    };

    for condition in conditions {
        if let Expr::Field { field, op: FieldOp::Eq, value } = condition {
            set_path(&mut seed, field, value.clone())?;
        }
    }

    Ok(seed)
}

fn cursor(documents: Vec<Document>) -> DocumentCursor {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

/// Connects to a shared in-memory database.
///
/// Clones share the same data. Every call to [`connect`](Connector::connect)
/// yields a new session and is counted, which tests use to observe how
/// often a store connects.
///
/// # Example
///
/// ```ignore
/// use doclink::{prelude::*, memory::InMemoryConnector, bson::doc};
///
/// let store = DocumentStore::new(InMemoryConnector::new());
/// let person = store.insert_one("people", doc! { "givenName": "Jose" }, InsertOptions::default()).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    store: Arc<RwLock<StoreMap>>,
    connections: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    /// Creates a connector to a new, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions established so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Backend = InMemoryBackend;

    async fn connect(&self) -> DocumentStoreResult<InMemoryBackend> {
        self.connections.fetch_add(1, Ordering::SeqCst);

        let backend = InMemoryBackend {
            store: Arc::clone(&self.store),
            session: Uuid::new_v4(),
        };
        tracing::debug!(session = %backend.session, "in-memory session opened");

        Ok(backend)
    }
}

/// One session with an in-memory database.
#[derive(Clone, Debug)]
pub struct InMemoryBackend {
    store: Arc<RwLock<StoreMap>>,
    session: Uuid,
}

impl InMemoryBackend {
    /// Identifies this session; clones share it.
    pub fn session_id(&self) -> Uuid {
        self.session
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        _options: InsertOptions,
    ) -> DocumentStoreResult<Document> {
        let mut store = self.store.write().await;
        let collection_state = store.entry(collection.to_string()).or_default();

        collection_state.purge_expired(Utc::now());
        collection_state.check_unique(collection, &document, None)?;
        collection_state.documents.push(document.clone());

        Ok(document)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let filter = Expr::from_document(&filter)?;
        let store = self.store.read().await;
        let Some(collection_state) = store.get(collection) else {
            return Ok(cursor(vec![]));
        };

        let positions = collection_state.select(&filter, options.sort.as_ref(), Utc::now())?;
        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        let documents = positions
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|position| {
                project(
                    collection_state.documents[position].clone(),
                    options.projection.as_ref(),
                )
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(cursor(documents))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> DocumentStoreResult<Option<Document>> {
        let filter = Expr::from_document(&filter)?;
        let store = self.store.read().await;
        let Some(collection_state) = store.get(collection) else {
            return Ok(None);
        };

        collection_state
            .select(&filter, None, Utc::now())?
            .first()
            .map(|&position| project(collection_state.documents[position].clone(), projection.as_ref()))
            .transpose()
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        validate_update(&update)?;
        let filter = Expr::from_document(&filter)?;
        let now = Utc::now();

        let mut store = self.store.write().await;
        let collection_state = store.entry(collection.to_string()).or_default();
        collection_state.purge_expired(now);

        let position = collection_state
            .select(&filter, options.sort.as_ref(), now)?
            .first()
            .copied();

        let (before, after) = match position {
            Some(position) => {
                let before = collection_state.documents[position].clone();
                let mut after = before.clone();
                apply_update(&mut after, &update, false)?;
                collection_state.check_unique(collection, &after, Some(position))?;
                collection_state.documents[position] = after.clone();

                (Some(before), after)
            }
            None if options.upsert => {
                let mut inserted = upsert_seed(&filter)?;
                apply_update(&mut inserted, &update, true)?;
                if !inserted.contains_key("_id") {
                    inserted.insert("_id", ObjectId::new());
                }
                collection_state.check_unique(collection, &inserted, None)?;
                collection_state.documents.push(inserted.clone());

                (None, inserted)
            }
            None => return Ok(None),
        };

        match options.return_document {
            ReturnDocument::Before => before,
            ReturnDocument::After => Some(after),
        }
        .map(|document| project(document, options.projection.as_ref()))
        .transpose()
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let filter = Expr::from_document(&filter)?;
        let now = Utc::now();

        let mut store = self.store.write().await;
        let Some(collection_state) = store.get_mut(collection) else {
            return Ok(None);
        };
        collection_state.purge_expired(now);

        collection_state
            .select(&filter, options.sort.as_ref(), now)?
            .first()
            .map(|&position| collection_state.documents.remove(position))
            .map(|document| project(document, options.projection.as_ref()))
            .transpose()
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> DocumentStoreResult<IndexCreated> {
        if keys.is_empty() {
            return Err(DocumentStoreError::Driver("Index keys cannot be empty".to_string()));
        }
        if options.expire_after.is_some() && keys.len() != 1 {
            return Err(DocumentStoreError::Driver(
                "TTL indexes are single-field indexes".to_string(),
            ));
        }

        let index = MemoryIndex {
            name: options.name.clone().unwrap_or_else(|| default_index_name(&keys)),
            keys,
            options: IndexOptions {
                name: None,
                ..options
            },
        };

        let mut store = self.store.write().await;
        let collection_state = store.entry(collection.to_string()).or_default();

        if let Some(existing) = collection_state
            .indexes
            .iter()
            .find(|existing| existing.name == index.name || existing.keys == index.keys)
        {
            if existing == &index {
                return Ok(IndexCreated { name: existing.name.clone() });
            }

            return Err(DocumentStoreError::Driver(format!(
                "Index already exists with different options or name: {}",
                existing.name
            )));
        }

        if index.options.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::new();
            for key in collection_state.documents.iter().filter_map(|d| index.key_of(d)) {
                if seen.contains(&key) {
                    let dup = index.keys.keys().cloned().zip(key).collect::<Document>();
                    return Err(duplicate_key(collection, &index.name, &dup));
                }
                seen.push(key);
            }
        }

        tracing::debug!(collection, index = %index.name, "index created");
        let name = index.name.clone();
        collection_state.indexes.push(index);

        Ok(IndexCreated { name })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<DocumentCursor> {
        let store = self.store.read().await;
        let snapshot = Snapshot {
            store: &store,
            now: Utc::now(),
        };

        let input = snapshot.documents(collection);
        Ok(cursor(pipeline::run(&pipeline, input, &snapshot)?))
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        tracing::debug!(session = %self.session, "in-memory session closed");

        Ok(())
    }
}
