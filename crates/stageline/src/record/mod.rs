//! Records flowing from the cleaner through validation into the store.

mod value;

pub use value::{
    DATE_FORMAT, TIMESTAMP_FORMAT, Value, parse_date, parse_timestamp, whole_number,
};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;

/// One input row: its position in the raw input plus an ordered field map.
///
/// Records are moved between stages, never shared. Validation classifies
/// them but does not edit field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Zero-based position in the raw input.
    #[serde(skip)]
    row: usize,
    /// Field values in source column order.
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record for the given input row.
    pub fn new(row: usize) -> Self {
        Self {
            row,
            fields: IndexMap::new(),
        }
    }

    /// Create a record from field/value pairs.
    pub fn from_pairs<K, V, I>(row: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            row,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, keeping its position if it already exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Position of this record in the raw input.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Look up a field. Absent fields return `None`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// True if the field is absent, null, or empty text.
    pub fn is_missing(&self, field: &str) -> bool {
        self.get(field).is_none_or(Value::is_missing)
    }

    /// True if the field is absent or null (empty text is not null).
    pub fn is_null(&self, field: &str) -> bool {
        self.get(field).is_none_or(Value::is_null)
    }

    /// Key value of `field` as it is stored, if present.
    pub fn key(&self, field: &str) -> Option<String> {
        self.get(field).and_then(Value::as_key)
    }

    /// Ordered field map.
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Mutable field map, for the cleaner.
    pub(crate) fn fields_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Order-preserving JSON object of the original fields.
    pub fn payload_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(3)
            .with_field("location_id", "CT001")
            .with_field("city", "")
            .with_field("parking_spaces", 10_i64)
            .with_field("data_date", Value::Null)
    }

    #[test]
    fn test_missing_and_null() {
        let record = sample();
        assert!(!record.is_missing("location_id"));
        assert!(record.is_missing("city"));
        assert!(!record.is_null("city"));
        assert!(record.is_null("data_date"));
        assert!(record.is_missing("not_a_column"));
        assert!(record.is_null("not_a_column"));
    }

    #[test]
    fn test_payload_preserves_order() {
        let payload = sample().payload_json().unwrap();
        assert_eq!(
            payload,
            r#"{"location_id":"CT001","city":"","parking_spaces":10,"data_date":null}"#
        );
    }

    #[test]
    fn test_set_keeps_position() {
        let mut record = sample();
        record.set("city", "Hartford");
        let names: Vec<_> = record.fields().keys().cloned().collect();
        assert_eq!(names, vec!["location_id", "city", "parking_spaces", "data_date"]);
        assert_eq!(record.row(), 3);
    }
}
