//! Stageline: validate tabular records and load them into a staging store.
//!
//! A source file is read, cleaned into typed records, and classified by an
//! ordered rule chain. Every record ends up in exactly one place: accepted
//! records are upserted into a typed staging table keyed by primary key,
//! rejected records are appended verbatim, with a single reason, to an
//! audit table.
//!
//! # Core Principles
//!
//! - **Exactly once**: every input record is either accepted or rejected
//! - **Idempotent**: re-loading the same file leaves the staging table unchanged
//! - **Atomic batches**: each batch commits or rolls back as a whole
//!
//! # Example
//!
//! ```no_run
//! use stageline::{Defaults, SourceConfig, Stageline};
//!
//! let source = SourceConfig::new("real_estate", "data/real_estate.csv");
//! let summary = Stageline::new(Defaults::default()).run(&source).unwrap();
//!
//! println!("Accepted: {}", summary.accepted);
//! println!("Rejected: {}", summary.rejected);
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod persistence;
pub mod record;
pub mod report;
pub mod schema;
pub mod validation;

mod stageline;

pub use crate::stageline::{RunSummary, Stageline, ValidatedSource};
pub use config::{Config, Defaults, RangeConfig, SourceConfig};
pub use error::{Result, StagelineError};
pub use input::{DataTable, SourceMetadata};
pub use persistence::{OnBatchError, PersistOptions, PersistenceOutcome};
pub use record::{Record, Value};
pub use report::{MemoryReporter, NullReporter, Reporter, TracingReporter};
pub use schema::{ColumnSchema, ColumnType, TableSchema};
pub use validation::{RejectedRecord, ValidationOutcome, ValidationPipeline};
