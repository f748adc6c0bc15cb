//! Core type definitions for staging table columns.

use serde::{Deserialize, Serialize};

/// Declared data type of a staging column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers (no decimal point).
    Integer,
    /// Floating-point numbers.
    Float,
    /// Text/string values.
    String,
    /// Date only (no time component).
    Date,
    /// Date and time values.
    DateTime,
}

impl ColumnType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Returns true if this type is temporal.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::DateTime | ColumnType::Date)
    }

    /// SQL type name used in DDL.
    pub fn sql_name(&self, max_length: Option<usize>) -> String {
        match (self, max_length) {
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::Float, _) => "REAL".to_string(),
            (ColumnType::String, Some(n)) => format!("VARCHAR({})", n),
            (ColumnType::String, None) => "TEXT".to_string(),
            (ColumnType::Date, _) => "DATE".to_string(),
            (ColumnType::DateTime, _) => "TIMESTAMP".to_string(),
        }
    }
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::String
    }
}
