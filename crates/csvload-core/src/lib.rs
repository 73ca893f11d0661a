//! csvload core library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Parallel bulk loading of delimited files into a relational table.
//!
//! # Overview
//!
//! The pipeline reads rows from a [`source::RecordSource`], derives the
//! column [`schema::Schema`] from the first record, and fans the remaining
//! rows out to a fixed pool of workers over a bounded channel. Each worker
//! persists rows through a [`sink::Sink`] with a bounded retry policy;
//! rows that fail terminally are collected in a [`dlq::DeadLetterQueue`]
//! instead of stalling the run.
//!
//! # Example
//!
//! ```no_run
//! use csvload_core::{CsvSource, LoadConfig, PgSink, Pipeline};
//!
//! # async fn load(pool: sqlx::PgPool) -> anyhow::Result<()> {
//! let mut source = CsvSource::from_path("data/domains.csv", b',').await?;
//! let schema = source.read_schema().await?;
//! let sink = PgSink::new(pool, "domain", &schema);
//!
//! let pipeline = Pipeline::new(LoadConfig::default());
//! let report = pipeline.run(source, schema, sink).await?;
//! println!("loaded {} rows", report.rows_loaded);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dlq;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;
pub mod tracker;

mod worker;

// Re-export commonly used types
pub use config::{ArityPolicy, LoadConfig, RetryPolicy};
pub use dlq::{DeadLetter, DeadLetterQueue};
pub use error::{LoadError, PersistError, Result, SchemaError, SourceError};
pub use pipeline::{LoadReport, Pipeline};
pub use schema::Schema;
pub use sink::{PgSink, Sink};
pub use source::{CsvSource, RecordSource, Row};
pub use tracker::CompletionTracker;
