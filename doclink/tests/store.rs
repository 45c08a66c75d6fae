use std::time::Duration;

use bson::{Bson, doc, oid::ObjectId};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use doclink::{memory::InMemoryConnector, prelude::*};

fn store() -> DocumentStore<InMemoryConnector> {
    DocumentStore::new(InMemoryConnector::new())
}

async fn insert_jose(store: &DocumentStore<InMemoryConnector>) -> (ObjectId, bson::Document) {
    let jose = store
        .insert_one(
            "people",
            doc! { "givenName": "Jose", "email": "jose@x.io" },
            InsertOptions::default(),
        )
        .await
        .unwrap();

    (jose.get_object_id("_id").unwrap(), jose)
}

#[tokio::test]
async fn concurrent_first_calls_share_one_connection() {
    let store = store();

    let (first, second) = tokio::join!(store.connection().acquire(), store.connection().acquire());

    assert_eq!(first.unwrap().session_id(), second.unwrap().session_id());
    assert_eq!(store.connection().connector().connection_count(), 1);

    store.insert_one("people", doc! {}, InsertOptions::default()).await.unwrap();
    store.find_one("people", doc! {}, None).await.unwrap();
    assert_eq!(store.connection().connector().connection_count(), 1);
}

#[tokio::test]
async fn construction_does_not_connect() {
    let store = store();

    assert!(!store.connection().is_connected().await);
    assert_eq!(store.connection().connector().connection_count(), 0);

    store.disconnect().await.unwrap();
    assert_eq!(store.connection().connector().connection_count(), 0);
}

#[tokio::test]
async fn find_one_fails_where_find_is_empty() {
    let store = store();
    insert_jose(&store).await;

    let err = store
        .find_one("people", doc! { "givenName": "Ana" }, None)
        .await
        .unwrap_err();
    let found = store
        .find("people", doc! { "givenName": "Ana" }, None)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert!(matches!(&err, DocumentStoreError::NotFound { collection, .. } if collection == "people"));
    assert!(err.to_string().contains("Ana"));
    assert!(found.is_empty());
}

#[tokio::test]
async fn jose_round_trip_then_delete() {
    let store = store();
    let (id, jose) = insert_jose(&store).await;

    assert_eq!(store.get_document_by_id("people", id, None).await.unwrap(), jose);
    assert_eq!(store.get_document_by_id("people", id.to_hex(), None).await.unwrap(), jose);

    let deleted = store
        .delete_document("people", id, FindOneAndDeleteOptions::default())
        .await
        .unwrap();
    assert_eq!(deleted, Some(jose));

    let err = store.get_document_by_id("people", id, None).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::NotFound { .. }));
}

#[tokio::test]
async fn invalid_ids_are_rejected_before_querying() {
    let store = store();

    let err = store
        .get_document_by_id("people", "not-an-id", None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidId(_)));
    assert!(!DocumentStore::<InMemoryConnector>::is_valid_id("not-an-id"));
    assert!(DocumentStore::<InMemoryConnector>::is_valid_id(&ObjectId::new().to_hex()));
}

#[tokio::test]
async fn typed_documents_round_trip() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        #[serde(rename = "_id")]
        id: ObjectId,
        #[serde(rename = "givenName")]
        given_name: String,
        email: String,
    }

    let store = store();
    let person = Person {
        id: ObjectId::new(),
        given_name: "Jose".to_string(),
        email: "jose@x.io".to_string(),
    };

    store
        .insert_one("people", to_document(&person).unwrap(), InsertOptions::default())
        .await
        .unwrap();

    let found: Person = from_document(store.get_document_by_id("people", person.id, None).await.unwrap()).unwrap();
    assert_eq!(found, person);
}

#[tokio::test]
async fn batch_lookup_splits_hits_and_misses() {
    let store = store();
    let (jose, _) = insert_jose(&store).await;
    let address = store
        .insert_one("address", doc! { "street": "Main st" }, InsertOptions::default())
        .await
        .unwrap()
        .get_object_id("_id")
        .unwrap();

    let batch = store
        .get_documents_by_id(vec![
            IdQuery::new("people", jose),
            IdQuery::new("address", address),
            IdQuery::new("people", ObjectId::new()),
            IdQuery::new("address", "bogus"),
        ])
        .await;

    assert_eq!(batch.documents.len(), 2);
    assert_eq!(batch.errors.len(), 2);
    assert_eq!(batch.get(&jose).and_then(|d| d.get_str("givenName").ok()), Some("Jose"));
    assert!(batch.errors.iter().any(|e| matches!(e, DocumentStoreError::NotFound { .. })));
    assert!(batch.errors.iter().any(|e| matches!(e, DocumentStoreError::InvalidId(_))));
}

#[tokio::test]
async fn batch_lookup_collapses_repeated_ids() {
    let store = store();
    let (jose, expected) = insert_jose(&store).await;

    let batch = store
        .get_documents_by_id(vec![
            IdQuery::new("people", jose),
            IdQuery::new("people", jose.to_hex()),
            IdQuery::new("people", jose),
        ])
        .await;

    assert_eq!(batch.documents.len(), 1);
    assert!(batch.errors.is_empty());
    assert_eq!(batch.get(&jose), Some(&expected));
}

#[tokio::test]
async fn multi_collection_search() {
    let store = store();
    let (jose, expected) = insert_jose(&store).await;
    store
        .insert_one("address", doc! { "street": "Main st" }, InsertOptions::default())
        .await
        .unwrap();

    let found = store
        .search_collections_for_document_with_id(&["address", "people"], jose)
        .await
        .unwrap();
    assert_eq!(found, expected);

    let missing = ObjectId::new();
    let err = store
        .search_collections_for_document_with_id(&["address", "people"], missing)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Document {missing} not found in collections: address,people")
    );

    let none: [&str; 0] = [];
    let err = store
        .search_collections_for_document_with_id(&none, missing)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unique_index_rejects_second_insert() {
    let store = store();
    let index = store
        .collection_with_unique_indices("users", doc! { "email": 1 })
        .await
        .unwrap();
    assert_eq!(index.name, "email_1");

    store
        .insert_one("users", doc! { "email": "jose@x.io" }, InsertOptions::default())
        .await
        .unwrap();
    let err = store
        .insert_one("users", doc! { "email": "jose@x.io" }, InsertOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Driver(_)));
}

#[tokio::test]
async fn temporary_documents_expire() {
    let store = store();
    store
        .collection_with_temporary_documents("sessions", "createdAt", Duration::from_secs(60))
        .await
        .unwrap();

    let stale = bson::DateTime::from_millis(bson::DateTime::now().timestamp_millis() - 120_000);
    store
        .insert_one("sessions", doc! { "token": "old", "createdAt": stale }, InsertOptions::default())
        .await
        .unwrap();
    store
        .insert_one("sessions", doc! { "token": "new", "createdAt": bson::DateTime::now() }, InsertOptions::default())
        .await
        .unwrap();

    let live = store
        .find("sessions", doc! {}, doc! { "token": 1, "_id": 0 })
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(live, vec![doc! { "token": "new" }]);
}

#[tokio::test]
async fn find_and_modify_pass_none_through() {
    let store = store();
    let missing = doc! { "_id": ObjectId::new() };

    let updated = store
        .find_one_and_update(
            "people",
            missing.clone(),
            doc! { "$set": { "email": "x" } },
            FindOneAndUpdateOptions::default(),
        )
        .await
        .unwrap();
    let deleted = store
        .find_one_and_delete("people", missing, FindOneAndDeleteOptions::default())
        .await
        .unwrap();

    assert_eq!(updated, None);
    assert_eq!(deleted, None);
}

#[tokio::test]
async fn update_document_by_id() {
    let store = store();
    let (id, _) = insert_jose(&store).await;

    let updated = store
        .update_document(
            "people",
            id,
            doc! { "$set": { "email": "updated@email.com" } },
            FindOneAndUpdateOptions::default().return_document(ReturnDocument::After),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.get_str("email").unwrap(), "updated@email.com");
}

#[tokio::test]
async fn aggregate_joins_with_lookup() {
    let store = store();
    let address = store
        .insert_one("address", doc! { "street": "Main st" }, InsertOptions::default())
        .await
        .unwrap();
    let reference = address.get_object_id("_id").unwrap();
    store
        .insert_one(
            "people",
            doc! { "givenName": "Jose", "reference": reference },
            InsertOptions::default(),
        )
        .await
        .unwrap();

    let joined = store
        .aggregate(
            "people",
            [
                doc! { "$match": { "givenName": "Jose" } },
                doc! { "$lookup": {
                    "from": "address",
                    "localField": "reference",
                    "foreignField": "_id",
                    "as": "address",
                } },
            ],
        )
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(joined.len(), 1);
    assert_eq!(
        joined[0].get_array("address").unwrap(),
        &vec![Bson::Document(address)]
    );
}

#[tokio::test]
async fn typed_filters_render_to_queries() {
    let store = store();
    insert_jose(&store).await;
    store
        .insert_one("people", doc! { "givenName": "Ana", "age": 31 }, InsertOptions::default())
        .await
        .unwrap();

    let filter = Filter::and([Filter::exists("age"), Filter::gt("age", 30)]).to_document().unwrap();
    let found = store.find_one("people", filter, doc! { "givenName": 1, "_id": 0 }).await.unwrap();

    assert_eq!(found, doc! { "givenName": "Ana" });
}

#[tokio::test]
async fn reconnects_after_disconnect() {
    let store = store();
    let (id, jose) = insert_jose(&store).await;
    let first = store.connection().acquire().await.unwrap().session_id();

    store.disconnect().await.unwrap();
    store.disconnect().await.unwrap();
    assert!(!store.connection().is_connected().await);

    assert_eq!(store.get_document_by_id("people", id, None).await.unwrap(), jose);
    let second = store.connection().acquire().await.unwrap().session_id();

    assert_ne!(first, second);
    assert_eq!(store.connection().connector().connection_count(), 2);
}
