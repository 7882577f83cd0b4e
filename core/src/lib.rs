//! # Gridacct Core
//!
//! Streaming ingestion of grid job accounting documents (GFD.98 usage
//! records) into validated, uniquely identified accounting entries.
//!
//! ## Pipeline
//!
//! - **Event source** ([`source`]): raw XML to start/text/end events
//! - **Accumulator** ([`accumulator`]): events to one buffered draft per record
//! - **Assembler** ([`assembler`]): draft to validated [`UsageRecord`], committed
//!   through a [`RecordStore`]
//! - **Report** ([`report`]): per-record outcomes keyed by sequence number
//!
//! Each record is committed on its own. A record that fails validation or
//! collides with an existing identity is reported and skipped; the records
//! around it are unaffected.
//!
//! ## Example
//!
//! ```ignore
//! use gridacct_core::UsageRecordParser;
//!
//! let parser = UsageRecordParser::new(store);
//! let report = parser
//!     .parse(r#"<JobUsageRecord><RecordIdentity recordId="abcd"/><Status>completed</Status></JobUsageRecord>"#)
//!     .await?;
//! assert!(report.messages.is_empty());
//! assert!(report.errors.is_empty());
//! ```

pub mod accumulator;
pub mod assembler;
pub mod attributes;
pub mod config;
pub mod draft;
pub mod environment;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod model;
pub mod parser;
pub mod report;
pub mod service;
pub mod source;
pub mod store;
pub mod values;
pub mod vocabulary;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub use accumulator::{Accumulator, CompletedRecord};
pub use assembler::{Persisted, RecordAssembler};
pub use config::ParserConfig;
pub use environment::{Clock, SystemClock};
pub use error::{
    DocumentError, LookupError, Mutation, RecordError, SourceError, StoreError, StoreResult, Violation,
};
pub use identity::{GuidAllocator, IdentityAllocator};
pub use model::{
    DifferentiatedProperty, KeyInfo, KeyInfoOwner, NumericProperty, OtherProperty, OtherValue, ProcessId,
    ResourceType, UsageRecord, UserIdentity,
};
pub use parser::UsageRecordParser;
pub use report::{Failure, IngestReport, Notice};
pub use service::UsageRecordService;
pub use source::{XmlEvent, XmlEventSource};
pub use store::RecordStore;
pub use vocabulary::{PropertyKind, ResourceKind};
