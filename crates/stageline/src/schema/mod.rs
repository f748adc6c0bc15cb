//! Schema types for the typed staging table.

mod column;
mod table;
mod types;

pub use column::ColumnSchema;
pub use table::{TableSchema, quote_ident};
pub use types::ColumnType;
