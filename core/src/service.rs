//! Operations on committed records.
//!
//! Records can be fetched by identity. They can never be changed: update
//! and delete exist only to refuse, so callers get the business rule as a
//! typed error instead of a missing method.

use crate::error::{LookupError, Mutation, StoreError};
use crate::model::UsageRecord;
use crate::store::RecordStore;

/// Read access to committed usage records.
#[derive(Debug, Clone)]
pub struct UsageRecordService<S> {
    store: S,
}

impl<S: RecordStore> UsageRecordService<S> {
    /// Service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Fetch a committed record by identity.
    ///
    /// # Errors
    ///
    /// - [`LookupError::NoIdentitySupplied`] when `record_identity` is absent or blank
    /// - [`LookupError::NotFound`] when nothing is committed under it
    /// - [`LookupError::Store`] when the store fails
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, record_identity: Option<&str>) -> Result<UsageRecord, LookupError> {
        let record_identity = record_identity
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .ok_or(LookupError::NoIdentitySupplied)?;
        self.store
            .find(record_identity)
            .await?
            .ok_or_else(|| LookupError::NotFound(record_identity.to_string()))
    }

    /// Always refused: committed records never change.
    ///
    /// # Errors
    ///
    /// Always [`StoreError::Immutable`].
    pub fn update(&self, record_identity: &str, _changes: UsageRecord) -> Result<(), StoreError> {
        tracing::warn!(record_identity, "refusing to update a usage record");
        Err(StoreError::Immutable(Mutation::Update))
    }

    /// Always refused: committed records are never removed.
    ///
    /// # Errors
    ///
    /// Always [`StoreError::Immutable`].
    pub fn delete(&self, record_identity: &str) -> Result<(), StoreError> {
        tracing::warn!(record_identity, "refusing to delete a usage record");
        Err(StoreError::Immutable(Mutation::Delete))
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}
