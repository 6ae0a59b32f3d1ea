//! Archive schema definitions
//!
//! An archive file holds named entries plus a small key/value metadata table.

/// SQL schema for an archive file
pub const SCHEMA_SQL: &str = r#"
-- Named payloads, append-only
CREATE TABLE IF NOT EXISTS entries (
    name TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    written_at TEXT NOT NULL
);

-- Archive-level metadata (kind, language, created_at, config_hash)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initializes the archive schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Archive format version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;
