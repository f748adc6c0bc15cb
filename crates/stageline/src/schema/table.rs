//! Staging table schema and the SQL derived from it.

use serde::{Deserialize, Serialize};

use super::column::ColumnSchema;
use super::types::ColumnType;

/// Schema for a staging table: typed columns keyed by one primary-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Primary-key column; must be one of `columns`.
    pub primary_key: String,
    /// Data columns in DDL order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(
        name: impl Into<String>,
        primary_key: impl Into<String>,
        columns: Vec<ColumnSchema>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            columns,
        }
    }

    /// The real-estate staging table: fifteen typed columns keyed by
    /// `location_id`.
    pub fn real_estate() -> Self {
        Self::new(
            "stg_real_estate",
            "location_id",
            vec![
                ColumnSchema::new("data_date", ColumnType::Date),
                ColumnSchema::varchar("ownership_type", 20),
                ColumnSchema::new("parking_spaces", ColumnType::Integer),
                ColumnSchema::varchar("status", 20),
                ColumnSchema::varchar("property_type", 50),
                ColumnSchema::varchar("congressional_district", 10),
                ColumnSchema::varchar("location_id", 20),
                ColumnSchema::new("region_id", ColumnType::Integer),
                ColumnSchema::varchar("ada_accessible", 50),
                ColumnSchema::varchar("ansi_usable", 50),
                ColumnSchema::varchar("city", 100),
                ColumnSchema::varchar("county", 100),
                ColumnSchema::varchar("address_line1", 200),
                ColumnSchema::varchar("state", 5),
                ColumnSchema::varchar("zip_code", 15),
            ],
        )
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of the primary key among the columns.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.name == self.primary_key)
    }

    /// True if the table declares `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in DDL order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_table_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote_ident(&c.name), c.sql_type());
                if c.name == self.primary_key {
                    def.push_str(" PRIMARY KEY NOT NULL");
                }
                def
            })
            .collect();
        defs.push("created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            defs.join(",\n    ")
        )
    }

    /// Insert-or-update statement with one positional parameter per column.
    ///
    /// On key conflict every non-key column is overwritten from the incoming
    /// row; `created_at` keeps its first value.
    pub fn upsert_sql(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let updates: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.name != self.primary_key)
            .map(|c| format!("{0} = excluded.{0}", quote_ident(&c.name)))
            .collect();

        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            quote_ident(&self.name),
            names.join(", "),
            placeholders.join(", "),
            quote_ident(&self.primary_key),
            conflict
        )
    }

    /// Key probe used to tell inserts from updates.
    pub fn exists_sql(&self) -> String {
        format!(
            "SELECT 1 FROM {} WHERE {} = ?1",
            quote_ident(&self.name),
            quote_ident(&self.primary_key)
        )
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::real_estate()
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
