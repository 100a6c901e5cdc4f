//! Database schema definitions and migrations.

use rusqlite::Connection;

use crate::DbError;

pub fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(SCHEMA)?;
    migrate_tokens_table(conn)?;
    Ok(())
}

/// tokens: databases created before the owner and role columns existed get
/// them added. Legacy rows belong to the broadcaster.
fn migrate_tokens_table(conn: &Connection) -> Result<(), DbError> {
    const COLUMNS: &[(&str, &str)] = &[
        ("user_id", "ALTER TABLE tokens ADD COLUMN user_id TEXT NOT NULL DEFAULT '';"),
        ("role", "ALTER TABLE tokens ADD COLUMN role TEXT NOT NULL DEFAULT 'broadcaster';"),
    ];
    for (column, ddl) in COLUMNS {
        if column_exists(conn, "tokens", column)? {
            continue;
        }
        tracing::info!(%column, "Adding column to tokens");
        conn.execute_batch(ddl)?;
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|name| name.as_deref() == Ok(column));
    Ok(exists)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL DEFAULT '',
    scope TEXT NOT NULL DEFAULT '',
    expires_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    setting_type TEXT NOT NULL DEFAULT 'normal',
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS title_history (
    title TEXT PRIMARY KEY,
    edit_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_title_history_edit_time ON title_history(edit_time);

CREATE TABLE IF NOT EXISTS joined_channels (
    user_id TEXT PRIMARY KEY,
    user_name TEXT NOT NULL,
    added_at INTEGER NOT NULL
);
"#;
