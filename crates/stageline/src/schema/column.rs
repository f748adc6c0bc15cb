//! Column schema definition.

use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Schema for a single staging column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name (snake-case field name).
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Maximum text length, for `VARCHAR(n)` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ColumnSchema {
    /// Create a column of the given type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_length: None,
        }
    }

    /// Create a `VARCHAR(max_length)` column.
    pub fn varchar(name: impl Into<String>, max_length: usize) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::String,
            max_length: Some(max_length),
        }
    }

    /// SQL type of this column.
    pub fn sql_type(&self) -> String {
        self.column_type.sql_name(self.max_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let col: ColumnSchema = serde_json::from_str(r#"{"name": "county"}"#).unwrap();
        assert_eq!(col.column_type, ColumnType::String);
        assert_eq!(col.sql_type(), "TEXT");

        let col: ColumnSchema =
            serde_json::from_str(r#"{"name": "state", "type": "string", "max_length": 5}"#)
                .unwrap();
        assert_eq!(col, ColumnSchema::varchar("state", 5));
    }
}
