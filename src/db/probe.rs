use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension};

use crate::error::MatchbookError;

/// Returns whether `table` exists in the live store.
///
/// There is no persisted schema-version ledger; callers decide what to do
/// based on what the catalog actually contains. A missing table is a normal
/// `false`, never an error.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, MatchbookError> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name = ?1 COLLATE NOCASE
             LIMIT 1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name.is_some())
}

/// Returns the set of column names of an existing table.
///
/// Callers must check `table_exists` first; introspecting a missing table
/// yields an empty set, which would be indistinguishable from a table with
/// no columns.
pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, MatchbookError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;

    let mut columns = HashSet::new();
    for name in rows {
        columns.insert(name?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE widgets (
                widget_id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                weight INTEGER
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_table_exists() {
        let conn = test_conn();
        assert!(table_exists(&conn, "widgets").unwrap());
        assert!(!table_exists(&conn, "gadgets").unwrap());
    }

    #[test]
    fn test_table_exists_is_case_insensitive() {
        let conn = test_conn();
        assert!(table_exists(&conn, "WIDGETS").unwrap());
        assert!(table_exists(&conn, "Widgets").unwrap());
    }

    #[test]
    fn test_table_columns() {
        let conn = test_conn();
        let columns = table_columns(&conn, "widgets").unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns.contains("widget_id"));
        assert!(columns.contains("label"));
        assert!(columns.contains("weight"));
    }

    #[test]
    fn test_table_columns_recomputed_per_call() {
        let conn = test_conn();
        assert!(!table_columns(&conn, "widgets").unwrap().contains("color"));

        conn.execute_batch("ALTER TABLE widgets ADD COLUMN color TEXT")
            .unwrap();

        // No cached schema state; the new column is visible immediately
        assert!(table_columns(&conn, "widgets").unwrap().contains("color"));
    }
}
