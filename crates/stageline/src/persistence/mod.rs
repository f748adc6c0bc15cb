//! Relational store for staging and reject tables.
//!
//! The store is SQLite. [`open`] connects, [`bootstrap`] creates missing
//! objects, and [`persist`] writes one run's accepted and rejected records
//! in batch transactions.

mod bind;
mod loader;
mod store;

pub use bind::{bind_row, coerce};
pub use loader::{
    BatchFailure, DEFAULT_BATCH_SIZE, OnBatchError, PersistOptions, PersistenceOutcome, persist,
};
pub use store::{
    REJECT_TABLE, bootstrap, bootstrap_sql, count_rows, object_exists, open, ping, reject_view_name,
};
