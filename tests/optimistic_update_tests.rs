mod common;

use casework_core::error::RecordStoreError;
use casework_core::models::RecordRef;
use casework_core::record_store::{InMemoryRecordStore, RecordStore};
use casework_core::state_machine::BusinessProcessStatus;
use common::*;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_concurrent_submits_sharing_one_token_commit_at_most_once() {
    let store = Arc::new(InMemoryRecordStore::new());
    let record_ref = RecordRef::primary("1");
    store.insert(record_ref.clone(), record("1", BusinessProcessStatus::Ready, None));

    let session = store.start_update(&record_ref, "NOTIFY").await.unwrap();

    let submits = (0..8).map(|i| {
        let store = store.clone();
        let record_ref = record_ref.clone();
        let token = session.token.clone();
        let mut data = session.record.clone();
        data.case_data = serde_json::json!({ "writer": i });
        tokio::spawn(async move { store.submit_update(&record_ref, &token, data).await })
    });

    let results = futures::future::join_all(submits).await;
    let committed = results
        .iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Ok(Err(RecordStoreError::Conflict { .. }))))
        .count();

    assert_eq!(committed, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(store.submit_count(), 1);
}

#[tokio::test]
async fn test_token_goes_stale_after_another_commit() {
    let store = Arc::new(InMemoryRecordStore::new());
    let record_ref = RecordRef::primary("1");
    store.insert(record_ref.clone(), record("1", BusinessProcessStatus::Ready, None));

    let early = assert_ok!(store.start_update(&record_ref, "A").await);
    let late = assert_ok!(store.start_update(&record_ref, "B").await);
    assert_ok!(store.submit_update(&record_ref, &late.token, late.record).await);

    let err = assert_err!(store.submit_update(&record_ref, &early.token, early.record).await);
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_primary_and_linked_ids_are_separate_records() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert(RecordRef::primary("5"), record("5", BusinessProcessStatus::Ready, None));

    let err = assert_err!(store.start_update(&RecordRef::linked("5"), "A").await);
    assert!(matches!(err, RecordStoreError::NotFound { .. }));
}
