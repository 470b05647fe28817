//! SQLite schema definition.

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Complete database schema for lab report records.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Analysis Records (Immutable after insert; only created and deleted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS analysis_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,       -- insertion order
    id TEXT NOT NULL UNIQUE,
    timestamp INTEGER NOT NULL,                  -- epoch milliseconds
    files TEXT NOT NULL,                         -- JSON array of FilePayload
    patient_info TEXT,                           -- JSON object, NULL when absent
    analysis_result TEXT NOT NULL,
    summary TEXT NOT NULL,
    file_count INTEGER NOT NULL CHECK (file_count > 0)
);

CREATE INDEX IF NOT EXISTS idx_records_timestamp ON analysis_records(timestamp);

-- Records are never edited in place
CREATE TRIGGER IF NOT EXISTS analysis_records_no_update BEFORE UPDATE ON analysis_records
BEGIN
    SELECT RAISE(ABORT, 'Analysis records are immutable');
END;

PRAGMA user_version = 1;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn insert(conn: &Connection, id: &str, file_count: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO analysis_records (id, timestamp, files, analysis_result, summary, file_count)
             VALUES (?1, 0, '[]', '', '', ?2)",
            rusqlite::params![id, file_count],
        )
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);

        // Re-applying is harmless
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_user_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_file_count_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        assert!(insert(&conn, "empty", 0).is_err());
        assert!(insert(&conn, "ok", 1).is_ok());
    }

    #[test]
    fn test_unique_id_and_no_update() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        insert(&conn, "rec-1", 1).unwrap();
        assert!(insert(&conn, "rec-1", 1).is_err());

        let result = conn.execute(
            "UPDATE analysis_records SET summary = 'changed' WHERE id = 'rec-1'",
            [],
        );
        assert!(result.is_err());
    }
}
