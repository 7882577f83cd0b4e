//! Error types for usage record ingestion, persistence and lookup.
//!
//! Failures are split by where they can happen:
//!
//! - [`Violation`]: a single broken domain invariant (`"Status can't be blank"`)
//! - [`RecordError`]: why one record of a document was not committed
//! - [`StoreError`]: persistence failures, including the immutability rule
//! - [`LookupError`]: fetch-by-identity failures
//! - [`SourceError`]: the input document itself could not be read
//! - [`DocumentError`]: a [`SourceError`] plus the outcomes reported before it

use crate::report::IngestReport;
use std::fmt;
use thiserror::Error;

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// Required value missing or whitespace only.
    Blank,
    /// Value does not parse as a number.
    NotANumber,
    /// Value parses as a number but not as an integer.
    NotAnInteger,
    /// Value is below zero.
    Negative,
    /// Value collides with an already committed record.
    Taken,
    /// Value is not an RFC 3339 or naive ISO 8601 timestamp.
    InvalidTimestamp,
    /// Value is not a recognizable boolean.
    InvalidBoolean,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Blank => "can't be blank",
            Self::NotANumber => "is not a number",
            Self::NotAnInteger => "must be an integer",
            Self::Negative => "must be greater than or equal to 0",
            Self::Taken => "has already been taken",
            Self::InvalidTimestamp => "is not a valid date-time",
            Self::InvalidBoolean => "is not a valid boolean",
        };
        f.write_str(text)
    }
}

/// A broken invariant on one field of a usage record or one of its children.
///
/// Displays as a sentence: `"Memory storage unit can't be blank"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{subject} {reason}")]
pub struct Violation {
    /// Human readable name of the offending field, capitalized.
    pub subject: String,
    /// What is wrong with it.
    pub reason: ViolationReason,
}

impl Violation {
    /// Build a violation for `subject`.
    #[must_use]
    pub fn new(subject: impl Into<String>, reason: ViolationReason) -> Self {
        Self {
            subject: subject.into(),
            reason,
        }
    }

    /// `"<subject> can't be blank"`
    #[must_use]
    pub fn blank(subject: impl Into<String>) -> Self {
        Self::new(subject, ViolationReason::Blank)
    }

    /// `"<subject> has already been taken"`
    #[must_use]
    pub fn taken(subject: impl Into<String>) -> Self {
        Self::new(subject, ViolationReason::Taken)
    }
}

/// The mutation attempted on a committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Replace fields of a committed record.
    Update,
    /// Remove a committed record.
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Errors raised by a [`RecordStore`](crate::store::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this identity is already committed.
    #[error("Record identity {0} has already been taken")]
    DuplicateIdentity(String),

    /// Committed records never change. This is a business rule, not a
    /// transient failure, so callers must not retry.
    #[error("Cannot {0} a usage record")]
    Immutable(Mutation),

    /// Backend failure (connection, query, transaction).
    #[error("Database error: {0}")]
    Database(String),
}

/// Why one record of a document was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record, or one of its children, broke a domain invariant.
    #[error("Validation failed: {0}")]
    Invalid(#[from] Violation),

    /// The store refused or failed the commit.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RecordError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateIdentity(_) => Self::Invalid(Violation::taken("Record identity")),
            other => Self::Store(other),
        }
    }
}

/// Errors from fetching a committed record by identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The caller passed no identity, or only whitespace.
    #[error("No record identity was supplied")]
    NoIdentitySupplied,

    /// Nothing is committed under this identity.
    #[error("Could not find usage record with id {0}")]
    NotFound(String),

    /// The store failed while looking.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The input could not be turned into parse events.
///
/// Raised for malformed XML. Records whose closing tag was seen before the
/// malformed region stay committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed document at byte {position}: {message}")]
pub struct SourceError {
    /// Byte offset in the input where reading stopped.
    pub position: u64,
    /// Description from the tokenizer.
    pub message: String,
}

/// A document abandoned at a malformed region.
///
/// `report` holds the outcome of every record closed before reading stopped.
/// Those records stay committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct DocumentError {
    /// Why reading stopped.
    pub error: SourceError,
    /// Outcomes of the records read before the malformed region.
    pub report: IngestReport,
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
