//! Persistence contract for usage records.
//!
//! A store commits whole aggregates. It owns two rules the rest of the
//! pipeline relies on:
//!
//! - **Atomicity**: the root and every child become visible together, or
//!   not at all.
//! - **Uniqueness**: `record_identity` is unique. The check happens at
//!   commit, so two records with the same explicit identity resolve
//!   first-writer-wins.
//!
//! Committed records are never updated or deleted, so the trait has no
//! operations for either.

use crate::error::StoreResult;
use crate::model::UsageRecord;
use std::future::Future;

/// Backend storage for usage records.
///
/// Implementations: `InMemoryRecordStore` (testing) and
/// `PostgresRecordStore` (production).
pub trait RecordStore: Send + Sync {
    /// Commit a validated aggregate in one transaction.
    ///
    /// Returns the record as stored, with `created_at` stamped.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateIdentity`](crate::error::StoreError::DuplicateIdentity)
    ///   if the identity is already committed
    /// - [`StoreError::Database`](crate::error::StoreError::Database) on backend failure
    fn insert(
        &self,
        record: UsageRecord,
    ) -> impl Future<Output = StoreResult<UsageRecord>> + Send;

    /// Load a committed aggregate with all of its children.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](crate::error::StoreError::Database) on backend failure.
    fn find(
        &self,
        record_identity: &str,
    ) -> impl Future<Output = StoreResult<Option<UsageRecord>>> + Send;

    /// Number of committed records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](crate::error::StoreError::Database) on backend failure.
    fn count(&self) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Check whether an identity is committed.
    ///
    /// Default implementation uses [`RecordStore::find`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](crate::error::StoreError::Database) on backend failure.
    fn exists(&self, record_identity: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        async move { Ok(self.find(record_identity).await?.is_some()) }
    }
}
