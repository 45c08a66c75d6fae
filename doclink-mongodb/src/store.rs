use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{self as mongo_options, ClientOptions},
};

use doclink_core::{
    backend::{Connector, DocumentBackend},
    document::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    options::{
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOptions, IndexCreated, IndexOptions,
        InsertOptions, ReturnDocument,
    },
    store::DocumentStore,
};

fn driver_error(error: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Driver(error.to_string())
}

fn connection_error(error: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Connection(error.to_string())
}

fn cursor(cursor: mongodb::Cursor<Document>) -> DocumentCursor {
    cursor.map_err(driver_error).boxed()
}

/// Opens a lazily connecting store over the deployment at `url`.
pub fn open(url: impl Into<String>) -> DocumentStore<MongoConnector> {
    DocumentStore::new(MongoConnector::from_url(url))
}

/// A connected MongoDB client bound to one database.
#[derive(Clone, Debug)]
pub struct MongoBackend {
    client: Client,
    database: String,
}

impl MongoBackend {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Name of the database every collection is taken from.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// The underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
        options: InsertOptions,
    ) -> DocumentStoreResult<Document> {
        let mut insert_options = mongo_options::InsertOneOptions::default();
        insert_options.bypass_document_validation = options.bypass_document_validation;

        let result = self
            .get_collection(collection)
            .insert_one(&document)
            .with_options(insert_options)
            .await
            .map_err(driver_error)?;

        if !document.contains_key("_id") {
            document.insert("_id", result.inserted_id);
        }

        Ok(document)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let mut find_options = mongo_options::FindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.limit = options.limit;

        Ok(cursor(
            self.get_collection(collection)
                .find(filter)
                .with_options(find_options)
                .await
                .map_err(driver_error)?,
        ))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut find_options = mongo_options::FindOneOptions::default();
        find_options.projection = projection;

        self.get_collection(collection)
            .find_one(filter)
            .with_options(find_options)
            .await
            .map_err(driver_error)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut update_options = mongo_options::FindOneAndUpdateOptions::default();
        update_options.return_document = Some(match options.return_document {
            ReturnDocument::Before => mongo_options::ReturnDocument::Before,
            ReturnDocument::After => mongo_options::ReturnDocument::After,
        });
        update_options.upsert = Some(options.upsert);
        update_options.projection = options.projection;
        update_options.sort = options.sort;

        self.get_collection(collection)
            .find_one_and_update(filter, update)
            .with_options(update_options)
            .await
            .map_err(driver_error)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut delete_options = mongo_options::FindOneAndDeleteOptions::default();
        delete_options.projection = options.projection;
        delete_options.sort = options.sort;

        self.get_collection(collection)
            .find_one_and_delete(filter)
            .with_options(delete_options)
            .await
            .map_err(driver_error)
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> DocumentStoreResult<IndexCreated> {
        let mut index_options = mongo_options::IndexOptions::default();
        index_options.unique = options.unique.then_some(true);
        index_options.sparse = options.sparse.then_some(true);
        index_options.expire_after = options.expire_after;
        index_options.name = options.name;

        let result = self
            .get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(keys)
                    .options(index_options)
                    .build(),
            )
            .await
            .map_err(driver_error)?;

        Ok(IndexCreated {
            name: result.index_name,
        })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<DocumentCursor> {
        Ok(cursor(
            self.get_collection(collection)
                .aggregate(pipeline)
                .await
                .map_err(driver_error)?,
        ))
    }

    /// Shuts the client down without waiting for cursors callers still hold.
    async fn close(&self) -> DocumentStoreResult<()> {
        self.client.clone().shutdown().immediate(true).await;

        Ok(())
    }
}

/// Lazily turns a connection string into a [`MongoBackend`].
///
/// Created with [`MongoConnector::from_url`] or configured through
/// [`MongoConnector::builder`].
#[derive(Clone, Debug)]
pub struct MongoConnector {
    url: String,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoConnector {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::builder(url).build()
    }

    pub fn builder(url: impl Into<String>) -> MongoConnectorBuilder {
        MongoConnectorBuilder::new(url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parses the connection string and applies the configured overrides.
    pub async fn client_options(&self) -> DocumentStoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.url)
            .await
            .map_err(connection_error)?;

        if let Some(app_name) = &self.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(min_size) = self.min_pool_size {
            options.min_pool_size = Some(min_size);
        }
        if let Some(max_size) = self.max_pool_size {
            options.max_pool_size = Some(max_size);
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }
        if let Some(database) = &self.database {
            options.default_database = Some(database.clone());
        }

        Ok(options)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Backend = MongoBackend;

    async fn connect(&self) -> DocumentStoreResult<MongoBackend> {
        let options = self.client_options().await?;
        let database = options.default_database.clone().ok_or_else(|| {
            DocumentStoreError::Connection(
                "No database named in the connection string or configuration".to_string(),
            )
        })?;

        let client = Client::with_options(options).map_err(connection_error)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;

        tracing::info!(database = %database, "mongodb client connected");

        Ok(MongoBackend::new(client, database))
    }
}

pub struct MongoConnectorBuilder {
    url: String,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoConnectorBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
            app_name: None,
            min_pool_size: None,
            max_pool_size: None,
            connect_timeout: None,
            server_selection_timeout: None,
        }
    }

    /// Database to use instead of the one named in the URL.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> MongoConnector {
        MongoConnector {
            url: self.url,
            database: self.database,
            app_name: self.app_name,
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size,
            connect_timeout: self.connect_timeout,
            server_selection_timeout: self.server_selection_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_overrides_connection_string() {
        let connector = MongoConnector::builder("mongodb://localhost:27017/people?maxPoolSize=50")
            .database("accounts")
            .app_name("doclink-tests")
            .min_pool_size(2)
            .max_pool_size(10)
            .connect_timeout(Duration::from_secs(3))
            .server_selection_timeout(Duration::from_secs(4))
            .build();

        let options = connector.client_options().await.unwrap();

        assert_eq!(options.default_database.as_deref(), Some("accounts"));
        assert_eq!(options.app_name.as_deref(), Some("doclink-tests"));
        assert_eq!(options.min_pool_size, Some(2));
        assert_eq!(options.max_pool_size, Some(10));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(4)));
    }

    #[tokio::test]
    async fn database_defaults_to_the_url() {
        let options = MongoConnector::from_url("mongodb://localhost:27017/people")
            .client_options()
            .await
            .unwrap();

        assert_eq!(options.default_database.as_deref(), Some("people"));
    }

    #[tokio::test]
    async fn connect_without_database_is_a_connection_error() {
        let err = MongoConnector::from_url("mongodb://localhost:27017")
            .connect()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Connection(_)));
    }

    #[tokio::test]
    async fn malformed_url_is_a_connection_error() {
        let err = MongoConnector::from_url("not a connection string")
            .client_options()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Connection(_)));
    }
}
