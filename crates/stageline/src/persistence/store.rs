//! Store connection and idempotent schema bootstrap.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StagelineError};
use crate::schema::{TableSchema, quote_ident};

/// Append-only table holding rejected records.
pub const REJECT_TABLE: &str = "stg_rejects";

/// Open the store named by `db_url`.
///
/// Accepts a plain path, a `sqlite://` or `sqlite:` URL, or `:memory:`.
/// Parent directories are created as needed. Any failure here is a
/// connection failure: nothing has been written yet.
pub fn open(db_url: &str, busy_timeout: Duration) -> Result<Connection> {
    let target = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);

    if target.trim().is_empty() {
        return Err(StagelineError::Connection("empty database URL".to_string()));
    }

    let opened = if target == ":memory:" {
        Connection::open_in_memory()
    } else {
        let path = Path::new(target);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StagelineError::Connection(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Connection::open(path)
    };
    let conn = opened
        .map_err(|e| StagelineError::Connection(format!("Failed to open '{}': {}", db_url, e)))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| StagelineError::Connection(format!("Failed to set busy timeout: {}", e)))?;

    ping(&conn)?;
    Ok(conn)
}

/// Round-trip a trivial query.
pub fn ping(conn: &Connection) -> Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(()))
        .map_err(|e| StagelineError::Connection(format!("Store is not reachable: {}", e)))
}

/// Name of the expansion view over rejects for `table`.
pub fn reject_view_name(table: &TableSchema) -> String {
    format!("v_{}_rejects", table.name)
}

/// Create the staging table, the reject table, its indexes and the
/// expansion view if they do not exist.
///
/// Safe to run on every load. Existing tables and rows are left as they
/// are; all statements run in one transaction.
pub fn bootstrap(conn: &mut Connection, table: &TableSchema) -> Result<()> {
    let statements = bootstrap_sql(table);

    let run = |conn: &mut Connection| -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        for sql in &statements {
            tx.execute_batch(sql)?;
        }
        tx.commit()
    };

    run(conn).map_err(|e| StagelineError::Connection(format!("Schema bootstrap failed: {}", e)))
}

/// Statements executed by [`bootstrap`], in order.
pub fn bootstrap_sql(table: &TableSchema) -> Vec<String> {
    let rejects = quote_ident(REJECT_TABLE);

    let projections: Vec<String> = table
        .column_names()
        .map(|name| format!("json_extract(raw_data, '$.{}') AS {}", name, quote_ident(name)))
        .collect();

    vec![
        table.create_table_sql(),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
             source_name VARCHAR(100) NOT NULL,\n    \
             raw_data TEXT NOT NULL CHECK (json_valid(raw_data)),\n    \
             rejection_reason TEXT NOT NULL,\n    \
             rejected_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
            rejects
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (source_name)",
            quote_ident(&format!("idx_{}_source", REJECT_TABLE)),
            rejects
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (rejected_at)",
            quote_ident(&format!("idx_{}_rejected_at", REJECT_TABLE)),
            rejects
        ),
        format!(
            "CREATE VIEW IF NOT EXISTS {} AS \
             SELECT id, source_name, rejection_reason, rejected_at, {} FROM {}",
            quote_ident(&reject_view_name(table)),
            projections.join(", "),
            rejects
        ),
    ]
}

/// Number of rows in `table`.
pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// True if a table or view named `name` exists.
pub fn object_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
