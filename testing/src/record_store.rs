//! In-memory record store for fast, deterministic tests.
//!
//! - [`InMemoryRecordStore`]: `Vec`-backed store enforcing identity uniqueness
//! - [`FailingRecordStore`]: store whose commits fail for chosen identities

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use crate::mocks::{FixedClock, test_clock};
use gridacct_core::assembler::stamp;
use gridacct_core::{RecordStore, StoreError, StoreResult, UsageRecord};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// In-memory usage record store.
///
/// Clones share the same records, so a test can hand one clone to a parser
/// and inspect another.
///
/// # Example
///
/// ```
/// use gridacct_testing::InMemoryRecordStore;
/// use gridacct_core::{RecordStore, UsageRecord};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
/// let record = UsageRecord {
///     record_identity: "abcd".to_string(),
///     status: "Completed".to_string(),
///     ..UsageRecord::default()
/// };
/// store.insert(record).await?;
/// assert_eq!(store.count().await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<Vec<UsageRecord>>>,
    clock: FixedClock,
}

impl InMemoryRecordStore {
    /// Create a new empty store stamping records with [`test_clock`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(test_clock())
    }

    /// Create a new empty store stamping records with `clock`.
    #[must_use]
    pub fn with_clock(clock: FixedClock) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    /// Clear all records (for test isolation)
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }

    /// Number of committed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Committed record by identity.
    #[must_use]
    pub fn get(&self, record_identity: &str) -> Option<UsageRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|record| record.record_identity == record_identity)
            .cloned()
    }

    /// All committed records in commit order.
    #[must_use]
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.read().unwrap().clone()
    }

    /// All committed identities in commit order.
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.records
            .read()
            .unwrap()
            .iter()
            .map(|record| record.record_identity.clone())
            .collect()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: UsageRecord) -> StoreResult<UsageRecord> {
        let mut records = self.records.write().unwrap();
        if records
            .iter()
            .any(|existing| existing.record_identity == record.record_identity)
        {
            return Err(StoreError::DuplicateIdentity(record.record_identity));
        }
        let record = stamp(record, &self.clock);
        records.push(record.clone());
        Ok(record)
    }

    async fn find(&self, record_identity: &str) -> StoreResult<Option<UsageRecord>> {
        Ok(self.get(record_identity))
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.len() as u64)
    }

    async fn exists(&self, record_identity: &str) -> StoreResult<bool> {
        Ok(self.get(record_identity).is_some())
    }
}

/// Store whose commits fail with a database error for chosen identities.
///
/// Every other commit goes to the wrapped [`InMemoryRecordStore`].
#[derive(Clone, Debug, Default)]
pub struct FailingRecordStore {
    inner: InMemoryRecordStore,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl FailingRecordStore {
    /// Store failing commits of `identities`.
    #[must_use]
    pub fn failing<I, T>(identities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            inner: InMemoryRecordStore::new(),
            failing: Arc::new(RwLock::new(identities.into_iter().map(Into::into).collect())),
        }
    }

    /// The store receiving successful commits.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryRecordStore {
        &self.inner
    }
}

impl RecordStore for FailingRecordStore {
    async fn insert(&self, record: UsageRecord) -> StoreResult<UsageRecord> {
        if self.failing.read().unwrap().contains(&record.record_identity) {
            return Err(StoreError::Database("connection reset by peer".to_string()));
        }
        self.inner.insert(record).await
    }

    async fn find(&self, record_identity: &str) -> StoreResult<Option<UsageRecord>> {
        self.inner.find(record_identity).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.inner.count().await
    }
}
