use rusqlite::Connection;

use crate::error::AppError;

pub const SCHEMA_VERSION: i32 = 2;

pub fn init(conn: &Connection) -> Result<(), AppError> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS interactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_input_text TEXT,
            user_input_voice_path TEXT,
            response_text TEXT,
            response_voice_path TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_interactions_created_at
            ON interactions(created_at);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}

// The log is append-only.
fn migrate_v2(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        r"
        CREATE TRIGGER IF NOT EXISTS interactions_no_update
        BEFORE UPDATE ON interactions
        BEGIN
            SELECT RAISE(ABORT, 'interactions are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS interactions_no_delete
        BEFORE DELETE ON interactions
        BEGIN
            SELECT RAISE(ABORT, 'interactions are append-only');
        END;

        PRAGMA user_version = 2;
        ",
    )?;
    Ok(())
}
