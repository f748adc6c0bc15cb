//! Batched, transactional writes of accepted and rejected records.
//!
//! Accepted records are upserted into the staging table; rejected records
//! are appended to the reject log. Both are written in fixed-size batches,
//! one transaction per batch. A failing batch is rolled back as a whole and
//! reported; batches committed before it stay committed.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Transaction, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, StagelineError};
use crate::record::{Record, TIMESTAMP_FORMAT};
use crate::report::Reporter;
use crate::schema::{TableSchema, quote_ident};
use crate::validation::RejectedRecord;

use super::bind::bind_row;
use super::store::{REJECT_TABLE, ping};

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What to do after a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnBatchError {
    /// Roll back the batch and continue with the next one.
    #[default]
    Continue,
    /// Roll back the batch and stop the persistence step.
    Abort,
}

/// Options for one persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOptions {
    /// Records per batch transaction.
    pub batch_size: usize,
    /// Failure policy.
    pub on_batch_error: OnBatchError,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            on_batch_error: OnBatchError::Continue,
        }
    }
}

impl PersistOptions {
    /// Options with the given batch size and the default policy.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

/// A batch that was rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Table the batch targeted.
    pub table: String,
    /// Zero-based batch index within that table's writes.
    pub batch_index: usize,
    /// Number of records in the batch (none of them were kept).
    pub rows: usize,
    /// Key of the record that failed.
    pub key: String,
    /// Error message.
    pub error: String,
}

/// Result of a persistence step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistenceOutcome {
    /// Staging rows newly inserted.
    pub inserted: usize,
    /// Staging rows overwritten by key.
    pub updated: usize,
    /// Reject rows appended.
    pub appended: usize,
    /// Batches committed (both tables).
    pub batches_committed: usize,
    /// Batches rolled back (both tables).
    pub batches_rolled_back: usize,
    /// One entry per rolled-back batch.
    pub failures: Vec<BatchFailure>,
    /// True if the step stopped early under [`OnBatchError::Abort`].
    pub aborted: bool,
}

impl PersistenceOutcome {
    /// True if every batch committed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    /// Records lost to rolled-back batches.
    pub fn rows_rolled_back(&self) -> usize {
        self.failures.iter().map(|f| f.rows).sum()
    }
}

/// Failure inside one batch, with the record that caused it.
struct BatchError {
    key: String,
    error: StagelineError,
}

impl BatchError {
    fn new(key: impl Into<String>, error: impl Into<StagelineError>) -> Self {
        Self {
            key: key.into(),
            error: error.into(),
        }
    }
}

/// Persist both partitions of a validation run.
///
/// Returns `Err` only if the store is unreachable before the first batch;
/// batch-level failures are reported in the outcome.
pub fn persist(
    conn: &mut Connection,
    table: &TableSchema,
    accepted: &[Record],
    rejected: &[RejectedRecord],
    options: &PersistOptions,
    reporter: &dyn Reporter,
) -> Result<PersistenceOutcome> {
    if options.batch_size == 0 {
        return Err(StagelineError::Config(
            "batch size must be at least 1".to_string(),
        ));
    }
    let pk_index = table.primary_key_index().ok_or_else(|| {
        StagelineError::Config(format!(
            "primary key '{}' is not a column of {}",
            table.primary_key, table.name
        ))
    })?;
    ping(conn)?;

    reporter.record(
        "persist_started",
        &[
            ("table", json!(table.name)),
            ("accepted", json!(accepted.len())),
            ("rejected", json!(rejected.len())),
            ("batch_size", json!(options.batch_size)),
        ],
    );

    let mut outcome = PersistenceOutcome::default();
    let upsert_sql = table.upsert_sql();
    let exists_sql = table.exists_sql();
    let statements = UpsertStatements {
        upsert: &upsert_sql,
        exists: &exists_sql,
        pk_index,
    };

    for (batch_index, batch) in accepted.chunks(options.batch_size).enumerate() {
        let result = run_batch(conn, |tx| upsert_batch(tx, table, &statements, batch));
        match result {
            Ok((inserted, updated)) => {
                outcome.inserted += inserted;
                outcome.updated += updated;
                committed(&mut outcome, reporter, &table.name, batch_index, batch.len());
            }
            Err(err) => {
                let rows = batch.len();
                rolled_back(&mut outcome, reporter, &table.name, batch_index, rows, err);
                if options.on_batch_error == OnBatchError::Abort {
                    outcome.aborted = true;
                    break;
                }
            }
        }
    }

    if !outcome.aborted {
        for (batch_index, batch) in rejected.chunks(options.batch_size).enumerate() {
            let result = run_batch(conn, |tx| append_batch(tx, &table.primary_key, batch));
            match result {
                Ok(appended) => {
                    outcome.appended += appended;
                    committed(&mut outcome, reporter, REJECT_TABLE, batch_index, batch.len());
                }
                Err(err) => {
                    let rows = batch.len();
                    rolled_back(&mut outcome, reporter, REJECT_TABLE, batch_index, rows, err);
                    if options.on_batch_error == OnBatchError::Abort {
                        outcome.aborted = true;
                        break;
                    }
                }
            }
        }
    }

    reporter.record(
        "persist_completed",
        &[
            ("inserted", json!(outcome.inserted)),
            ("updated", json!(outcome.updated)),
            ("appended", json!(outcome.appended)),
            ("batches_committed", json!(outcome.batches_committed)),
            ("batches_rolled_back", json!(outcome.batches_rolled_back)),
            ("aborted", json!(outcome.aborted)),
        ],
    );

    Ok(outcome)
}

/// Run `write` inside one transaction: commit on success, roll back on any
/// error (including a failed commit).
fn run_batch<T, F>(conn: &mut Connection, write: F) -> std::result::Result<T, BatchError>
where
    F: FnOnce(&Transaction<'_>) -> std::result::Result<T, BatchError>,
{
    let tx = conn
        .transaction()
        .map_err(|e| BatchError::new("<none>", e))?;

    match write(&tx) {
        Ok(value) => {
            tx.commit().map_err(|e| BatchError::new("<commit>", e))?;
            Ok(value)
        }
        Err(err) => {
            // The error being reported is the write failure, not the rollback.
            let _ = tx.rollback();
            Err(err)
        }
    }
}

/// Prepared SQL for one staging table.
struct UpsertStatements<'a> {
    upsert: &'a str,
    exists: &'a str,
    pk_index: usize,
}

fn upsert_batch(
    tx: &Transaction<'_>,
    table: &TableSchema,
    statements: &UpsertStatements<'_>,
    batch: &[Record],
) -> std::result::Result<(usize, usize), BatchError> {
    let mut probe = tx
        .prepare_cached(statements.exists)
        .map_err(|e| BatchError::new("<prepare>", e))?;
    let mut upsert = tx
        .prepare_cached(statements.upsert)
        .map_err(|e| BatchError::new("<prepare>", e))?;

    let mut inserted = 0;
    let mut updated = 0;
    for record in batch {
        let key = record_key(record, &table.primary_key);
        let values = bind_row(table, record).map_err(|e| BatchError::new(key.clone(), e))?;

        // Probe with the exact value the upsert binds.
        let exists = match &values[statements.pk_index] {
            SqlValue::Null => false,
            pk => probe
                .exists([pk])
                .map_err(|e| BatchError::new(key.clone(), e))?,
        };

        upsert
            .execute(params_from_iter(values.iter()))
            .map_err(|e| BatchError::new(key, e))?;

        if exists {
            updated += 1;
        } else {
            inserted += 1;
        }
    }

    Ok((inserted, updated))
}

fn append_batch(
    tx: &Transaction<'_>,
    primary_key: &str,
    batch: &[RejectedRecord],
) -> std::result::Result<usize, BatchError> {
    let sql = format!(
        "INSERT INTO {} (source_name, raw_data, rejection_reason, rejected_at) \
         VALUES (?1, ?2, ?3, ?4)",
        quote_ident(REJECT_TABLE)
    );
    let mut insert = tx
        .prepare_cached(&sql)
        .map_err(|e| BatchError::new("<prepare>", e))?;

    for rejected in batch {
        let key = record_key(&rejected.record, primary_key);
        let payload = rejected
            .record
            .payload_json()
            .map_err(|e| BatchError::new(key.clone(), e))?;
        let rejected_at = rejected.rejected_at.format(TIMESTAMP_FORMAT).to_string();

        insert
            .execute(params![rejected.source, payload, rejected.reason, rejected_at])
            .map_err(|e| BatchError::new(key, e))?;
    }

    Ok(batch.len())
}

/// Key used to identify a record in failure reports.
fn record_key(record: &Record, primary_key: &str) -> String {
    record
        .key(primary_key)
        .unwrap_or_else(|| format!("row {}", record.row()))
}

fn committed(
    outcome: &mut PersistenceOutcome,
    reporter: &dyn Reporter,
    table: &str,
    batch_index: usize,
    rows: usize,
) {
    outcome.batches_committed += 1;
    reporter.record(
        "batch_committed",
        &[
            ("table", json!(table)),
            ("batch", json!(batch_index)),
            ("rows", json!(rows)),
        ],
    );
}

fn rolled_back(
    outcome: &mut PersistenceOutcome,
    reporter: &dyn Reporter,
    table: &str,
    batch_index: usize,
    rows: usize,
    err: BatchError,
) {
    let failure = BatchFailure {
        table: table.to_string(),
        batch_index,
        rows,
        key: err.key,
        error: err.error.to_string(),
    };
    reporter.record(
        "batch_rolled_back",
        &[
            ("table", json!(failure.table)),
            ("batch", json!(failure.batch_index)),
            ("rows", json!(failure.rows)),
            ("key", json!(failure.key)),
            ("error", json!(failure.error)),
        ],
    );
    outcome.batches_rolled_back += 1;
    outcome.failures.push(failure);
}
