//! Coercion of record values to staging column types.

use rusqlite::types::Value as SqlValue;

use crate::error::{Result, StagelineError};
use crate::record::{
    DATE_FORMAT, Record, TIMESTAMP_FORMAT, Value, parse_date, parse_timestamp, whole_number,
};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// Bind parameters for one staging row, in column order.
///
/// Fields the table does not declare are ignored; declared columns the
/// record lacks bind as NULL.
pub fn bind_row(table: &TableSchema, record: &Record) -> Result<Vec<SqlValue>> {
    table
        .columns
        .iter()
        .map(|column| coerce(column, record.get(&column.name).unwrap_or(&Value::Null)))
        .collect()
}

/// Convert one value to the SQL value stored in `column`.
pub fn coerce(column: &ColumnSchema, value: &Value) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    if column.column_type != ColumnType::String && value.is_missing() {
        return Ok(SqlValue::Null);
    }

    match column.column_type {
        ColumnType::Integer => to_integer(value)
            .map(SqlValue::Integer)
            .ok_or_else(|| mismatch(column, value)),
        ColumnType::Float => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| mismatch(column, value)),
        ColumnType::String => {
            let text = match value {
                Value::Text(s) => s.clone(),
                other => other.to_string(),
            };
            if let Some(max) = column.max_length {
                let len = text.chars().count();
                if len > max {
                    return Err(StagelineError::Coercion {
                        column: column.name.clone(),
                        message: format!("{} characters exceed {}", len, column.sql_type()),
                    });
                }
            }
            Ok(SqlValue::Text(text))
        }
        ColumnType::Date => {
            let date = match value {
                Value::Date(d) => Some(*d),
                Value::Timestamp(ts) => Some(ts.date()),
                Value::Text(s) => parse_date(s),
                _ => None,
            };
            date.map(|d| SqlValue::Text(d.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| mismatch(column, value))
        }
        ColumnType::DateTime => {
            let ts = match value {
                Value::Timestamp(ts) => Some(*ts),
                Value::Date(d) => d.and_hms_opt(0, 0, 0),
                Value::Text(s) => parse_timestamp(s),
                _ => None,
            };
            ts.map(|t| SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string()))
                .ok_or_else(|| mismatch(column, value))
        }
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) => whole_number(*f),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
        }
        _ => None,
    }
}

fn mismatch(column: &ColumnSchema, value: &Value) -> StagelineError {
    StagelineError::Coercion {
        column: column.name.clone(),
        message: format!(
            "{} value '{}' is not a valid {}",
            value.type_name(),
            value,
            column.sql_type()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_integer_coercion() {
        let col = ColumnSchema::new("parking_spaces", ColumnType::Integer);
        assert_eq!(coerce(&col, &Value::Integer(4)).unwrap(), SqlValue::Integer(4));
        assert_eq!(coerce(&col, &Value::Float(4.0)).unwrap(), SqlValue::Integer(4));
        assert_eq!(coerce(&col, &Value::from(" 12 ")).unwrap(), SqlValue::Integer(12));
        assert_eq!(coerce(&col, &Value::from("")).unwrap(), SqlValue::Null);
        assert!(coerce(&col, &Value::Float(4.5)).is_err());
        assert!(coerce(&col, &Value::from("many")).is_err());
    }

    #[test]
    fn test_integer_overflow_is_a_coercion_error() {
        let col = ColumnSchema::new("region_id", ColumnType::Integer);
        for value in [Value::from("1e30"), Value::Float(1e30), Value::from("-1e30")] {
            let err = coerce(&col, &value).unwrap_err();
            assert!(matches!(
                err,
                StagelineError::Coercion { ref column, .. } if column == "region_id"
            ));
        }
        assert_eq!(coerce(&col, &Value::from("1e3")).unwrap(), SqlValue::Integer(1000));
    }

    #[test]
    fn test_varchar_length_is_enforced() {
        let col = ColumnSchema::varchar("state", 5);
        assert_eq!(coerce(&col, &Value::from("CT")).unwrap(), SqlValue::Text("CT".into()));
        let err = coerce(&col, &Value::from("Connecticut")).unwrap_err();
        assert!(err.to_string().contains("VARCHAR(5)"));
    }

    #[test]
    fn test_date_coercion() {
        let col = ColumnSchema::new("data_date", ColumnType::Date);
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(
            coerce(&col, &Value::Date(date)).unwrap(),
            SqlValue::Text("2020-02-29".into())
        );
        assert_eq!(
            coerce(&col, &Value::from("02/29/2020")).unwrap(),
            SqlValue::Text("2020-02-29".into())
        );
        assert!(coerce(&col, &Value::Integer(20200229)).is_err());
    }

    #[test]
    fn test_bind_row_follows_column_order() {
        let table = TableSchema::new(
            "t",
            "id",
            vec![
                ColumnSchema::varchar("id", 10),
                ColumnSchema::new("n", ColumnType::Integer),
                ColumnSchema::varchar("missing", 10),
            ],
        );
        let record = Record::new(0)
            .with_field("n", 3_i64)
            .with_field("ignored", "x")
            .with_field("id", "A1");

        let row = bind_row(&table, &record).unwrap();
        assert_eq!(
            row,
            vec![SqlValue::Text("A1".into()), SqlValue::Integer(3), SqlValue::Null]
        );
    }
}
