//! Accumulator and ingestion benchmarks
//!
//! - Tokenizing plus accumulating: records per second without persistence
//! - End-to-end ingestion into the in-memory store
//!
//! Run with: `cargo bench -p gridacct-core`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gridacct_core::{Accumulator, ParserConfig, UsageRecordParser, XmlEventSource};
use gridacct_testing::fixtures::{element, key_info, numeric, record_identity_with_key, wrap};
use gridacct_testing::{InMemoryRecordStore, SequentialIdentityAllocator};

fn document(records: usize) -> String {
    let body: Vec<String> = (0..records)
        .map(|n| {
            format!(
                "<JobUsageRecord>{}<Status>completed</Status>{}{}{}{}</JobUsageRecord>",
                record_identity_with_key(&format!("bench-{n}"), &key_info(&[("X509Ski", "a1b2")])),
                element("JobName", "simulation", &[("description", "nightly")]),
                element("Charge", "1.25", &[("unit", "EUR")]),
                numeric("Memory", "2048"),
                element("CpuDuration", "PT10M", &[("usageType", "user")]),
            )
        })
        .collect();
    wrap(&body)
}

fn benchmark_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    for records in [1, 100, 1_000] {
        let xml = document(records);
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &xml, |b, xml| {
            b.iter(|| {
                let mut accumulator = Accumulator::new(ParserConfig::default());
                let mut completed = 0usize;
                for event in XmlEventSource::new(black_box(xml)) {
                    if accumulator.handle(event.expect("well-formed")).is_some() {
                        completed += 1;
                    }
                }
                completed
            });
        });
    }
    group.finish();
}

fn benchmark_ingestion(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let xml = document(100);
    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Elements(100));
    group.bench_function("in_memory_100", |b| {
        b.iter(|| {
            let parser = UsageRecordParser::with_allocator(
                InMemoryRecordStore::new(),
                SequentialIdentityAllocator::new(),
            );
            runtime
                .block_on(parser.parse(black_box(&xml)))
                .expect("well-formed")
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_accumulation, benchmark_ingestion);
criterion_main!(benches);
