//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply a list of statements atomically
fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.commit()?;
    Ok(())
}

/// Migration to version 1: notes and notebooks
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS notebooks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
            "CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                is_list INTEGER NOT NULL DEFAULT 0,
                task_list TEXT NOT NULL DEFAULT '[]',
                is_archived INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                is_markdown_enabled INTEGER NOT NULL DEFAULT 1,
                is_local_only INTEGER NOT NULL DEFAULT 0,
                creation_date INTEGER NOT NULL,
                modified_date INTEGER NOT NULL,
                deletion_date INTEGER,
                color TEXT NOT NULL DEFAULT 'default',
                notebook_id INTEGER REFERENCES notebooks(id) ON DELETE SET NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                attachments TEXT NOT NULL DEFAULT '[]',
                reminders TEXT NOT NULL DEFAULT '[]'
            )",
            "CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(modified_date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(is_deleted)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: local/remote id mappings
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS id_mappings (
                mapping_id INTEGER PRIMARY KEY AUTOINCREMENT,
                local_note_id INTEGER REFERENCES notes(id) ON DELETE CASCADE,
                remote_note_id TEXT,
                provider TEXT,
                extras TEXT
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_id_mappings_remote
                ON id_mappings(remote_note_id, provider)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_id_mappings_local
                ON id_mappings(local_note_id, provider)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_enforces_unique_remote_id_per_provider() {
        let conn = setup();
        run(&conn).unwrap();

        conn.execute(
            "INSERT INTO id_mappings (remote_note_id, provider) VALUES ('7', 'nextcloud')",
            [],
        )
        .unwrap();
        let duplicate = conn.execute(
            "INSERT INTO id_mappings (remote_note_id, provider) VALUES ('7', 'nextcloud')",
            [],
        );
        assert!(duplicate.is_err());

        // Unassigned rows (NULL provider/remote id) never collide
        conn.execute("INSERT INTO id_mappings (extras) VALUES ('a')", [])
            .unwrap();
        conn.execute("INSERT INTO id_mappings (extras) VALUES ('b')", [])
            .unwrap();
    }
}
