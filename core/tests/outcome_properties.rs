//! Property tests for per-record outcome reporting.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use gridacct_core::UsageRecordParser;
use gridacct_testing::properties::{Expected, document};
use gridacct_testing::{InMemoryRecordStore, SequentialIdentityAllocator};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_record_is_accounted_for_exactly_once((xml, expected) in document(12)) {
        let parser = UsageRecordParser::with_allocator(
            InMemoryRecordStore::new(),
            SequentialIdentityAllocator::new(),
        );
        let report = runtime().block_on(parser.parse(&xml)).expect("well-formed");

        let reported = report.messages.len() + report.errors.len();
        let silent = expected.iter().filter(|e| **e == Expected::Silent).count();
        prop_assert_eq!(reported + silent, expected.len());

        for (index, outcome) in expected.iter().enumerate() {
            let sequence = u32::try_from(index + 1).unwrap();
            let in_messages = report.messages.contains_key(&sequence);
            let in_errors = report.errors.contains_key(&sequence);
            prop_assert!(!(in_messages && in_errors));
            match outcome {
                Expected::Silent => prop_assert!(!in_messages && !in_errors),
                Expected::Allocated => prop_assert!(in_messages),
                Expected::Rejected => prop_assert!(in_errors),
            }
        }

        let committed = expected.iter().filter(|e| **e != Expected::Rejected).count();
        prop_assert_eq!(parser.store().len(), committed);
    }

    #[test]
    fn sequence_numbers_cover_one_to_n_when_nothing_is_silent(count in 0usize..10) {
        let xml = format!(
            "<JobUsageRecords>{}</JobUsageRecords>",
            "<JobUsageRecord><Status>completed</Status></JobUsageRecord><UsageRecord/>".repeat(count)
        );
        let parser = UsageRecordParser::with_allocator(
            InMemoryRecordStore::new(),
            SequentialIdentityAllocator::new(),
        );
        let report = runtime().block_on(parser.parse(&xml)).expect("well-formed");

        let mut sequences: Vec<u32> = report.messages.keys().chain(report.errors.keys()).copied().collect();
        sequences.sort_unstable();
        let all: Vec<u32> = (1..=u32::try_from(count * 2).unwrap()).collect();
        prop_assert_eq!(sequences, all);
        prop_assert_eq!(report.errors.len(), count);
    }
}
