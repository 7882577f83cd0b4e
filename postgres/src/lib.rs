//! `PostgreSQL` record store for usage record ingestion.
//!
//! Implements [`gridacct_core::RecordStore`] on top of sqlx:
//!
//! - One transaction per aggregate (root plus children)
//! - Identity uniqueness enforced by a unique constraint
//! - Embedded migrations (`migrations/`)
//! - Connection pooling configured from the environment
//!
//! # Example
//!
//! ```ignore
//! use gridacct_core::UsageRecordParser;
//! use gridacct_postgres::{PostgresConfig, PostgresRecordStore};
//!
//! let store = PostgresRecordStore::connect(&PostgresConfig::from_env()).await?;
//! store.migrate().await?;
//! let report = UsageRecordParser::new(store).parse(&document).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

pub mod config;
pub mod store;

pub use config::PostgresConfig;
pub use store::PostgresRecordStore;

/// Errors raised while preparing the database.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The connection pool could not be opened.
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(#[source] sqlx::Error),

    /// A schema migration failed.
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
