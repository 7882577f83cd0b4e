//! # Gridacct Testing
//!
//! Testing utilities for the ingestion pipeline.
//!
//! This crate provides:
//! - In-memory record stores
//! - A deterministic identity allocator and a fixed clock
//! - Builders for usage record XML documents
//! - proptest strategies for generating documents

use chrono::{DateTime, Utc};
use gridacct_core::environment::Clock;

pub mod record_store;

/// Mock implementations of injected dependencies.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use gridacct_core::IdentityAllocator;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gridacct_testing::mocks::FixedClock;
    /// use gridacct_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Allocates `generated-1`, `generated-2`, ...
    ///
    /// Clones share the counter.
    #[derive(Debug, Clone, Default)]
    pub struct SequentialIdentityAllocator {
        next: Arc<AtomicU64>,
    }

    impl SequentialIdentityAllocator {
        /// Allocator starting at `generated-1`.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of identities handed out so far.
        #[must_use]
        pub fn allocated(&self) -> u64 {
            self.next.load(Ordering::SeqCst)
        }
    }

    impl IdentityAllocator for SequentialIdentityAllocator {
        fn allocate(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            format!("generated-{n}")
        }
    }
}

/// Builders for usage record XML documents.
///
/// # Example
///
/// ```
/// use gridacct_testing::fixtures::{record_with, wrap};
///
/// let document = wrap(&[record_with("", Some("abcd")), record_with("", Some("efgh"))]);
/// assert!(document.starts_with("<JobUsageRecords>"));
/// ```
pub mod fixtures {
    /// `<Status>completed</Status>`
    pub const STATUS: &str = "<Status>completed</Status>";

    /// A record with a status, an optional identity and `fragment` inside.
    #[must_use]
    pub fn record_with(fragment: &str, identity: Option<&str>) -> String {
        record(fragment, identity, true)
    }

    /// A record without a status element.
    #[must_use]
    pub fn record_without_status(fragment: &str, identity: Option<&str>) -> String {
        record(fragment, identity, false)
    }

    fn record(fragment: &str, identity: Option<&str>, include_status: bool) -> String {
        let identity = identity.map(record_identity).unwrap_or_default();
        let status = if include_status { STATUS } else { "" };
        format!("<JobUsageRecord>{identity}{status}{fragment}</JobUsageRecord>")
    }

    /// `<RecordIdentity urwg:recordId='..'/>`
    #[must_use]
    pub fn record_identity(identity: &str) -> String {
        format!("<RecordIdentity urwg:recordId='{identity}'/>")
    }

    /// Concatenate records under a `JobUsageRecords` wrapper.
    #[must_use]
    pub fn wrap(records: &[String]) -> String {
        format!("<JobUsageRecords>{}</JobUsageRecords>", records.concat())
    }

    /// An element with `urwg:`-prefixed attributes.
    #[must_use]
    pub fn element(tag: &str, value: &str, attributes: &[(&str, &str)]) -> String {
        let attributes: String = attributes
            .iter()
            .map(|(name, value)| format!(" urwg:{name}='{value}'"))
            .collect();
        format!("<{tag}{attributes}>{value}</{tag}>")
    }

    /// A numeric property with `metric='total'` and `storageUnit='MB'`.
    #[must_use]
    pub fn numeric(tag: &str, value: &str) -> String {
        element(tag, value, &[("metric", "total"), ("storageUnit", "MB")])
    }

    /// A `ds:KeyInfo` block with the given X509 children.
    #[must_use]
    pub fn key_info(fields: &[(&str, &str)]) -> String {
        let data: String = fields
            .iter()
            .map(|(tag, value)| format!("<ds:{tag}>{value}</ds:{tag}>"))
            .collect();
        format!("<ds:KeyInfo><ds:X509Data>{data}</ds:X509Data></ds:KeyInfo>")
    }

    /// A record identity section containing key info.
    #[must_use]
    pub fn record_identity_with_key(identity: &str, key: &str) -> String {
        format!("<RecordIdentity urwg:recordId='{identity}'>{key}</RecordIdentity>")
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::sync::Once;

    static TRACING: Once = Once::new();

    /// Install a fmt subscriber honouring `RUST_LOG`, once per process.
    pub fn init_tracing() {
        TRACING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use crate::fixtures::{numeric, record_with, record_without_status, wrap};
    use proptest::prelude::*;

    /// How a generated record is expected to end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Expected {
        /// Commits under its explicit identity.
        Silent,
        /// Commits under an allocated identity.
        Allocated,
        /// Fails validation.
        Rejected,
    }

    /// One generated record and its expected outcome.
    #[derive(Debug, Clone)]
    pub struct GeneratedRecord {
        /// The record's XML.
        pub xml: String,
        /// Expected outcome.
        pub expected: Expected,
    }

    /// A record that is valid, valid without identity, or missing its status.
    ///
    /// Explicit identities carry `index` so records never collide.
    pub fn record(index: usize) -> impl Strategy<Value = GeneratedRecord> {
        let property = prop_oneof![
            Just(String::new()),
            (0u32..100_000).prop_map(|n| numeric("Network", &n.to_string())),
            Just(numeric("Disk", "")),
        ];
        (0u8..3, property).prop_map(move |(shape, fragment)| match shape {
            0 => GeneratedRecord {
                xml: record_with(&fragment, Some(&format!("id-{index}"))),
                expected: Expected::Silent,
            },
            1 => GeneratedRecord {
                xml: record_with(&fragment, None),
                expected: Expected::Allocated,
            },
            _ => GeneratedRecord {
                xml: record_without_status(&fragment, Some(&format!("id-{index}"))),
                expected: Expected::Rejected,
            },
        })
    }

    /// A wrapped document of up to `max` generated records.
    pub fn document(max: usize) -> impl Strategy<Value = (String, Vec<Expected>)> {
        (0..=max)
            .prop_flat_map(|len| (0..len).map(record).collect::<Vec<_>>())
            .prop_map(|records| {
                let expected = records.iter().map(|r| r.expected).collect();
                let xml: Vec<String> = records.into_iter().map(|r| r.xml).collect();
                (wrap(&xml), expected)
            })
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdentityAllocator, test_clock};
pub use record_store::{FailingRecordStore, InMemoryRecordStore};
