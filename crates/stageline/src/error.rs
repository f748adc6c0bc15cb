//! Error types for the Stageline library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Stageline operations.
///
/// Records failing a validation rule are not errors; they are reported as
/// rejected records. These variants cover I/O, configuration and store
/// failures only.
#[derive(Debug, Error)]
pub enum StagelineError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid delimiter detected or specified.
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// Empty file or no columns to read.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Malformed configuration, detected before any record is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store could not be opened or prepared.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error from the SQLite driver.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A value could not be converted to its column's declared type.
    #[error("Cannot store value in column '{column}': {message}")]
    Coercion { column: String, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Stageline operations.
pub type Result<T> = std::result::Result<T, StagelineError>;
