//! Tests for the in-memory record stores

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::{TimeZone, Utc};
use gridacct_core::{RecordStore, StoreError, UsageRecord};
use gridacct_core::Clock;
use gridacct_testing::{FailingRecordStore, FixedClock, InMemoryRecordStore, test_clock};

fn record(identity: &str) -> UsageRecord {
    UsageRecord {
        record_identity: identity.to_string(),
        status: "Completed".to_string(),
        ..UsageRecord::default()
    }
}

#[tokio::test]
async fn insert_stamps_created_at() {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let store = InMemoryRecordStore::with_clock(clock);

    let stored = store.insert(record("abcd")).await.unwrap();

    assert_eq!(stored.created_at, Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
    assert_eq!(store.get("abcd").unwrap().created_at, stored.created_at);
}

#[tokio::test]
async fn duplicate_identity_is_rejected_and_first_wins() {
    let store = InMemoryRecordStore::new();
    store.insert(record("abcd")).await.unwrap();

    let mut second = record("abcd");
    second.status = "Failed".to_string();
    let result = store.insert(second).await;

    assert_eq!(result, Err(StoreError::DuplicateIdentity("abcd".to_string())));
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.get("abcd").unwrap().status, "Completed");
}

#[tokio::test]
async fn clones_share_records() {
    let store = InMemoryRecordStore::new();
    let clone = store.clone();
    clone.insert(record("a")).await.unwrap();
    clone.insert(record("b")).await.unwrap();

    assert_eq!(store.identities(), vec!["a".to_string(), "b".to_string()]);
    assert!(store.exists("a").await.unwrap());
    assert!(!store.exists("c").await.unwrap());

    store.clear();
    assert!(clone.is_empty());
}

#[tokio::test]
async fn find_returns_none_for_unknown_identity() {
    let store = InMemoryRecordStore::new();
    assert_eq!(store.find("missing").await.unwrap(), None);
    assert_eq!(store.records().len(), 0);
}

#[tokio::test]
async fn default_store_uses_the_test_clock() {
    let store = InMemoryRecordStore::default();
    let stored = store.insert(record("abcd")).await.unwrap();
    assert_eq!(stored.created_at, Some(test_clock().now()));
}

#[tokio::test]
async fn failing_store_fails_only_chosen_identities() {
    let store = FailingRecordStore::failing(["bad"]);

    let failed = store.insert(record("bad")).await;
    let committed = store.insert(record("good")).await;

    assert!(matches!(failed, Err(StoreError::Database(_))));
    assert!(committed.is_ok());
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.inner().identities(), vec!["good".to_string()]);
}

#[tokio::test]
async fn concurrent_inserts_of_one_identity_commit_once() {
    let store = InMemoryRecordStore::new();
    let (left, right) = (store.clone(), store.clone());

    let mut failed = record("abcd");
    failed.status = "Failed".to_string();
    let (first, second) = tokio::join!(left.insert(record("abcd")), right.insert(failed));

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|outcome| *outcome == Err(StoreError::DuplicateIdentity("abcd".to_string())))
    );
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_tasks_see_exactly_one_winner() {
    let store = InMemoryRecordStore::new();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.insert(record("abcd")).await })
        })
        .collect();
    let mut committed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => committed += 1,
            Err(error) => assert_eq!(error, StoreError::DuplicateIdentity("abcd".to_string())),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(store.identities(), vec!["abcd".to_string()]);
}
