//! Turns a raw [`DataTable`] into typed [`Record`]s.
//!
//! Headers are renamed to field names, cells are trimmed, null-like tokens
//! and per-field placeholders become `Null`, and cells in typed staging
//! columns are parsed. Numbers that do not parse stay as text so the range
//! rule can report them; dates that do not parse become `Null` so the
//! null rule owns that diagnosis.

use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::record::{Record, Value, parse_date, parse_timestamp, whole_number};
use crate::schema::{ColumnType, TableSchema};

use super::source::DataTable;

static NON_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("pattern is valid"));

/// Convert a free-form header to a snake_case field name.
pub fn snake_case(header: &str) -> String {
    NON_IDENTIFIER
        .replace_all(&header.trim().to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Counts of what cleaning changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    /// Records produced.
    pub records: usize,
    /// Headers renamed through the explicit mapping.
    pub mapped_columns: usize,
    /// Cells nulled because they matched a field placeholder.
    pub placeholders_nulled: usize,
    /// Date or timestamp cells that could not be parsed and became null.
    pub invalid_dates: usize,
}

/// Column renaming, placeholder handling and type coercion for one source.
#[derive(Debug, Clone)]
pub struct Cleaner {
    mapping: IndexMap<String, String>,
    placeholders: IndexMap<String, Vec<String>>,
    types: IndexMap<String, ColumnType>,
}

impl Cleaner {
    /// Create a cleaner that types fields after `table`'s columns.
    pub fn new(table: &TableSchema) -> Self {
        Self {
            mapping: IndexMap::new(),
            placeholders: IndexMap::new(),
            types: table
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.column_type))
                .collect(),
        }
    }

    /// Rename source headers; unmapped headers are snake-cased.
    pub fn with_mapping(mut self, mapping: IndexMap<String, String>) -> Self {
        self.mapping = mapping;
        self
    }

    /// Per-field values to read as null (after trimming).
    pub fn with_placeholders(mut self, placeholders: IndexMap<String, Vec<String>>) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Field name for a source header.
    pub fn field_name(&self, header: &str) -> String {
        match self.mapping.get(header) {
            Some(name) => name.clone(),
            None => snake_case(header),
        }
    }

    /// Clean every row. Row `i` of the table becomes the record with row
    /// index `i`.
    pub fn clean(&self, table: &DataTable) -> (Vec<Record>, CleanSummary) {
        let mut summary = CleanSummary {
            mapped_columns: table
                .headers
                .iter()
                .filter(|h| self.mapping.contains_key(h.as_str()))
                .count(),
            ..CleanSummary::default()
        };

        let fields = self.field_names(&table.headers);

        let records: Vec<Record> = table
            .rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let mut record = Record::new(row);
                for (field, cell) in fields.iter().zip(cells) {
                    let value = self.clean_cell(field, cell, &mut summary);
                    record.fields_mut().insert(field.clone(), value);
                }
                record
            })
            .collect();

        summary.records = records.len();
        tracing::debug!(
            records = summary.records,
            placeholders_nulled = summary.placeholders_nulled,
            invalid_dates = summary.invalid_dates,
            "Cleaned records"
        );
        (records, summary)
    }

    /// Field names for every header, in order.
    ///
    /// A name already taken by an earlier header gets a numeric suffix
    /// (`city_2`), so no cell overwrites another.
    fn field_names(&self, headers: &[String]) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::new();
        headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let base = match self.field_name(header) {
                    name if name.is_empty() => format!("column_{}", i + 1),
                    name => name,
                };
                let mut name = base.clone();
                let mut n = 2;
                while !taken.insert(name.clone()) {
                    name = format!("{}_{}", base, n);
                    n += 1;
                }
                if name != base {
                    tracing::warn!(header = %header, field = %name, "Field name already in use");
                }
                name
            })
            .collect()
    }

    fn clean_cell(&self, field: &str, cell: &str, summary: &mut CleanSummary) -> Value {
        let text = cell.trim();
        if DataTable::is_null_value(text) {
            return Value::Null;
        }
        if self
            .placeholders
            .get(field)
            .is_some_and(|tokens| tokens.iter().any(|t| t.trim() == text))
        {
            summary.placeholders_nulled += 1;
            return Value::Null;
        }

        match self.types.get(field) {
            Some(ColumnType::Integer) => parse_integer(text)
                .map(Value::Integer)
                .unwrap_or_else(|| Value::from(text)),
            Some(ColumnType::Float) => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float)
                .unwrap_or_else(|| Value::from(text)),
            Some(ColumnType::Date) => match parse_date(text) {
                Some(date) => Value::Date(date),
                None => {
                    summary.invalid_dates += 1;
                    Value::Null
                }
            },
            Some(ColumnType::DateTime) => match parse_timestamp(text) {
                Some(ts) => Value::Timestamp(ts),
                None => {
                    summary.invalid_dates += 1;
                    Value::Null
                }
            },
            Some(ColumnType::String) | None => Value::from(text),
        }
    }
}

/// Whole numbers, including float spellings such as `"12.0"`.
fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(whole_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cleaner() -> Cleaner {
        let mapping = IndexMap::from([
            ("location.id".to_string(), "location_id".to_string()),
            ("data.date".to_string(), "data_date".to_string()),
        ]);
        let placeholders = IndexMap::from([("data_date".to_string(), vec!["0".to_string()])]);
        Cleaner::new(&TableSchema::real_estate())
            .with_mapping(mapping)
            .with_placeholders(placeholders)
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> DataTable {
        DataTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            b',',
        )
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("data.parking spaces"), "data_parking_spaces");
        assert_eq!(snake_case("  Location ID "), "location_id");
        assert_eq!(snake_case("ADA-Accessible?"), "ada_accessible");
        assert_eq!(snake_case("..."), "");
    }

    #[test]
    fn test_mapping_wins_over_snake_case() {
        let cleaner = cleaner();
        assert_eq!(cleaner.field_name("location.id"), "location_id");
        assert_eq!(cleaner.field_name("location.address.city"), "location_address_city");
    }

    #[test]
    fn test_placeholder_date_becomes_null() {
        let raw = table(
            &["location.id", "data.date"],
            &[&[" CT001 ", "0"], &["CT002", "2019-05-01"], &["CT003", "soon"]],
        );
        let (records, summary) = cleaner().clean(&raw);

        assert_eq!(records[0].key("location_id").as_deref(), Some("CT001"));
        assert_eq!(records[0].get("location_id"), Some(&Value::from("CT001")));
        assert!(records[0].is_null("data_date"));
        assert_eq!(
            records[1].get("data_date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2019, 5, 1).unwrap()))
        );
        assert!(records[2].is_null("data_date"));
        assert_eq!(summary.placeholders_nulled, 1);
        assert_eq!(summary.invalid_dates, 1);
        assert_eq!(summary.mapped_columns, 2);
    }

    #[test]
    fn test_numeric_cells_are_typed() {
        let raw = table(&["parking_spaces", "region_id"], &[&["10.0", "3"], &["lots", "NA"]]);
        let (records, _) = cleaner().clean(&raw);

        assert_eq!(records[0].get("parking_spaces"), Some(&Value::Integer(10)));
        assert_eq!(records[0].get("region_id"), Some(&Value::Integer(3)));
        assert_eq!(records[1].get("parking_spaces"), Some(&Value::from("lots")));
        assert!(records[1].is_null("region_id"));
    }

    #[test]
    fn test_colliding_field_names_keep_both_cells() {
        let raw = table(
            &["location.id", "Location ID", "location_id"],
            &[&["CT001", "CT002", "CT003"]],
        );
        let (records, _) = cleaner().clean(&raw);

        assert_eq!(records[0].get("location_id"), Some(&Value::from("CT001")));
        assert_eq!(records[0].get("location_id_2"), Some(&Value::from("CT002")));
        assert_eq!(records[0].get("location_id_3"), Some(&Value::from("CT003")));
        assert_eq!(records[0].fields().len(), 3);
    }

    #[test]
    fn test_zero_is_only_null_where_configured() {
        let raw = table(&["parking_spaces", "data.date"], &[&["0", "0"]]);
        let (records, _) = cleaner().clean(&raw);
        assert_eq!(records[0].get("parking_spaces"), Some(&Value::Integer(0)));
        assert!(records[0].is_null("data_date"));
    }

    #[test]
    fn test_rows_keep_their_index_and_column_order() {
        let raw = table(&["state", "location.id"], &[&["CT", "A"], &["MA", "B"]]);
        let (records, summary) = cleaner().clean(&raw);

        assert_eq!(summary.records, 2);
        assert_eq!(records[1].row(), 1);
        let names: Vec<_> = records[0].fields().keys().cloned().collect();
        assert_eq!(names, vec!["state", "location_id"]);
    }

    #[test]
    fn test_empty_table() {
        let (records, summary) = cleaner().clean(&table(&["a"], &[]));
        assert!(records.is_empty());
        assert_eq!(summary.records, 0);
    }
}
