//! The ingestion entry point.
//!
//! [`UsageRecordParser`] wires the pieces together for one document:
//!
//! ```text
//! XmlEventSource ──▶ Accumulator ──(record closed)──▶ RecordAssembler ──▶ IngestReport
//! ```
//!
//! Records are committed one at a time, in document order, as soon as their
//! closing tag is read. A failure on one record is written to the report and
//! never stops the records after it.

use crate::accumulator::{Accumulator, CompletedRecord};
use crate::assembler::RecordAssembler;
use crate::config::ParserConfig;
use crate::error::{DocumentError, SourceError};
use crate::identity::{GuidAllocator, IdentityAllocator};
use crate::metrics::IngestMetrics;
use crate::report::IngestReport;
use crate::source::{XmlEvent, XmlEventSource};
use crate::store::RecordStore;
use std::time::Instant;

/// Parses usage record documents into a [`RecordStore`].
///
/// # Example
///
/// ```ignore
/// let parser = UsageRecordParser::new(store);
/// let report = parser.parse(&document).await?;
/// for (sequence, failure) in &report.errors {
///     eprintln!("record {sequence}: {}", failure.reason);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UsageRecordParser<S, A = GuidAllocator> {
    assembler: RecordAssembler<S, A>,
    config: ParserConfig,
}

impl<S: RecordStore> UsageRecordParser<S, GuidAllocator> {
    /// Parser allocating random GUIDs for records without an identity.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_allocator(store, GuidAllocator)
    }
}

impl<S, A> UsageRecordParser<S, A>
where
    S: RecordStore,
    A: IdentityAllocator,
{
    /// Parser with a custom identity allocator.
    #[must_use]
    pub fn with_allocator(store: S, allocator: A) -> Self {
        Self {
            assembler: RecordAssembler::new(store, allocator),
            config: ParserConfig::default(),
        }
    }

    /// Replace the parser configuration.
    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        self.assembler.store()
    }

    /// Ingest one XML document.
    ///
    /// Returns only after the whole input is consumed.
    ///
    /// # Errors
    ///
    /// [`DocumentError`] when the document is not well-formed XML. Records
    /// closed before the malformed region stay committed and are reported in
    /// the error's `report`.
    #[tracing::instrument(skip_all, fields(bytes = input.len()))]
    pub async fn parse(&self, input: &str) -> Result<IngestReport, DocumentError> {
        self.parse_events(XmlEventSource::new(input)).await
    }

    /// Ingest an already tokenized event stream.
    ///
    /// # Errors
    ///
    /// The first error yielded by `events`, with the report built so far.
    pub async fn parse_events<I>(&self, events: I) -> Result<IngestReport, DocumentError>
    where
        I: IntoIterator<Item = Result<XmlEvent, SourceError>>,
    {
        let started = Instant::now();
        let mut accumulator = Accumulator::new(self.config.clone());
        let mut report = IngestReport::default();

        for event in events {
            let event = match event {
                Ok(event) => event,
                Err(error) => {
                    IngestMetrics::record_malformed();
                    tracing::warn!(
                        %error,
                        records = accumulator.sequence(),
                        "abandoning malformed document"
                    );
                    return Err(DocumentError { error, report });
                }
            };
            if let Some(completed) = accumulator.handle(event) {
                self.commit(completed, &mut report).await;
            }
        }

        IngestMetrics::record_document(started.elapsed());
        tracing::info!(
            records = accumulator.sequence(),
            messages = report.messages.len(),
            errors = report.errors.len(),
            "document ingested"
        );
        Ok(report)
    }

    async fn commit(&self, completed: CompletedRecord, report: &mut IngestReport) {
        let sequence = completed.sequence;
        let requested = completed.requested_identity().map(str::to_string);
        match self.assembler.persist(completed.draft).await {
            Ok(persisted) => {
                IngestMetrics::record_committed(persisted.freshly_allocated);
                tracing::info!(
                    sequence,
                    record_identity = %persisted.record_identity,
                    allocated = persisted.freshly_allocated,
                    "usage record committed"
                );
                report.record_success(
                    sequence,
                    persisted.record_identity,
                    persisted.freshly_allocated,
                    requested,
                );
            }
            Err(error) => {
                IngestMetrics::record_failed();
                tracing::warn!(sequence, %error, "usage record rejected");
                report.record_failure(sequence, error, requested);
            }
        }
    }
}
