//! SQLite DDL for the schedule store.

use rusqlite::Connection;

/// Current on-disk layout version.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Complete DDL for the schedule database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- WAL lets the background context list records while the foreground writes.
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per schedule id; re-scheduling replaces the row.
CREATE TABLE IF NOT EXISTS schedules (
    id            TEXT PRIMARY KEY,
    fire_at_ms    INTEGER NOT NULL,
    descriptor    TEXT NOT NULL,      -- JSON NotificationDescriptor
    recurrence    TEXT,               -- JSON Recurrence, NULL for one-shot
    updated_at_ms INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_schedules_fire_at ON schedules(fire_at_ms);

-- Check-in engagement, one row per (local day, notification).
CREATE TABLE IF NOT EXISTS engagements (
    day             TEXT NOT NULL,    -- YYYY-MM-DD, local
    notification_id TEXT NOT NULL,
    kind            TEXT NOT NULL,
    at_ms           INTEGER NOT NULL,
    PRIMARY KEY (day, notification_id)
);
"#;

/// Apply the full schema to an open connection and seed the version row.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the current schema version, `None` if never seeded.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_schema_creates_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"schedules".to_owned()));
        assert!(tables.contains(&"engagements".to_owned()));
        assert!(tables.contains(&"schema_meta".to_owned()));
    }

    #[test]
    fn apply_schema_is_idempotent_and_keeps_version() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first apply");
        conn.execute(
            "UPDATE schema_meta SET value = '7' WHERE key = 'schema_version'",
            [],
        )
        .expect("bump version");
        apply_schema(&conn).expect("second apply");

        let version = read_schema_version(&conn).expect("read").expect("seeded");
        assert_eq!(version, 7);
    }
}
