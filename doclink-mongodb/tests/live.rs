//! Tests against a running deployment. Set `DOCLINK_TEST_URL` to a connection
//! string naming a database and run with `cargo test -- --ignored`.

use std::time::Duration;

use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;

use doclink_core::{
    error::DocumentStoreError,
    id::IdQuery,
    options::{FindOneAndUpdateOptions, InsertOptions, ReturnDocument},
    store::DocumentStore,
};
use doclink_mongodb::MongoConnector;

fn store() -> DocumentStore<MongoConnector> {
    let url = std::env::var("DOCLINK_TEST_URL").expect("DOCLINK_TEST_URL must be set");

    doclink_mongodb::open(url)
}

fn collection(prefix: &str) -> String {
    format!("{prefix}_{}", ObjectId::new().to_hex())
}

#[tokio::test]
#[ignore]
async fn insert_and_find_by_id() {
    let store = store();
    let people = collection("people");

    let jose = store
        .insert_one(&people, doc! { "givenName": "Jose", "email": "jose@x.io" }, InsertOptions::default())
        .await
        .unwrap();
    let id = jose.get_object_id("_id").unwrap();

    let found = store.get_document_by_id(&people, id, None).await.unwrap();
    assert_eq!(found, jose);

    let batch = store
        .get_documents_by_id(vec![IdQuery::new(&people, id), IdQuery::new(&people, ObjectId::new())])
        .await;
    assert_eq!(batch.documents.len(), 1);
    assert_eq!(batch.errors.len(), 1);

    store.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn find_one_reports_not_found_and_update_passes_through() {
    let store = store();
    let people = collection("people");

    let err = store.find_one(&people, doc! { "givenName": "Nobody" }, None).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::NotFound { .. }));

    let updated = store
        .find_one_and_update(
            &people,
            doc! { "givenName": "Nobody" },
            doc! { "$set": { "email": "x" } },
            FindOneAndUpdateOptions::default().return_document(ReturnDocument::After),
        )
        .await
        .unwrap();
    assert_eq!(updated, None);

    let all = store.find(&people, doc! {}, None).await.unwrap();
    assert!(all.try_collect::<Vec<_>>().await.unwrap().is_empty());

    store.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn unique_and_ttl_indexes_report_their_names() {
    let store = store();
    let users = collection("users");

    let unique = store.collection_with_unique_indices(&users, doc! { "email": 1 }).await.unwrap();
    let ttl = store
        .collection_with_temporary_documents(&users, "createdAt", Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(unique.name, "email_1");
    assert_eq!(ttl.name, "createdAt_1");

    store.insert_one(&users, doc! { "email": "a@x.io" }, InsertOptions::default()).await.unwrap();
    let err = store
        .insert_one(&users, doc! { "email": "a@x.io" }, InsertOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Driver(_)));

    store.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn disconnect_does_not_wait_for_open_cursors() {
    let store = store();
    let people = collection("people");
    for n in 0..3 {
        store.insert_one(&people, doc! { "n": n }, InsertOptions::default()).await.unwrap();
    }

    let open_cursor = store
        .find_with_options(&people, doc! {}, doclink_core::options::FindOptions::default())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), store.disconnect())
        .await
        .expect("disconnect waited for an open cursor")
        .unwrap();

    drop(open_cursor);
}
