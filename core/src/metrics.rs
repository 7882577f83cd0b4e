//! Prometheus metrics for ingestion.
//!
//! Counters are emitted through the `metrics` facade and cost nothing until
//! a recorder is installed. [`MetricsExporter`] installs the Prometheus one.
//!
//! # Example
//!
//! ```rust,no_run
//! use gridacct_core::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), gridacct_core::metrics::MetricsError> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! // ... ingest documents ...
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs and renders the Prometheus recorder.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Exporter with nothing installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed. A
    /// recorder that is already installed is not an error; [`render`](Self::render)
    /// then returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "usage_documents_parsed_total",
        "Total number of documents read to the end"
    );
    describe_counter!(
        "usage_documents_malformed_total",
        "Total number of documents abandoned on malformed XML"
    );
    describe_counter!(
        "usage_records_committed_total",
        "Total number of usage records committed"
    );
    describe_counter!(
        "usage_records_failed_total",
        "Total number of usage records rejected"
    );
    describe_counter!(
        "usage_record_identities_allocated_total",
        "Total number of record identities allocated for records without one"
    );
    describe_histogram!(
        "usage_document_parse_duration_seconds",
        "Time taken to ingest one document"
    );
}

/// Ingestion metrics recorder.
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record a committed record.
    pub fn record_committed(freshly_allocated: bool) {
        counter!("usage_records_committed_total").increment(1);
        if freshly_allocated {
            counter!("usage_record_identities_allocated_total").increment(1);
        }
    }

    /// Record a rejected record.
    pub fn record_failed() {
        counter!("usage_records_failed_total").increment(1);
    }

    /// Record a document read to the end.
    pub fn record_document(duration: Duration) {
        counter!("usage_documents_parsed_total").increment(1);
        histogram!("usage_document_parse_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a document abandoned on malformed XML.
    pub fn record_malformed() {
        counter!("usage_documents_malformed_total").increment(1);
    }
}
