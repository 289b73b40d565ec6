//! Cache schema

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

pub const SCHEMA_VERSION: i64 = 2;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id             TEXT PRIMARY KEY,
    email          TEXT NOT NULL,
    provider       TEXT NOT NULL,
    description    TEXT,
    total_messages INTEGER NOT NULL DEFAULT 0,
    last_sync      TEXT
);

CREATE TABLE IF NOT EXISTS folders (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id    TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    message_count INTEGER NOT NULL DEFAULT 0,
    unread_count  INTEGER NOT NULL DEFAULT 0,
    last_sync     TEXT,
    UNIQUE (account_id, name)
);

CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id      TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    folder_id       INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    uid             INTEGER NOT NULL,
    message_id      TEXT,
    subject         TEXT NOT NULL DEFAULT '',
    sender          TEXT NOT NULL DEFAULT '',
    recipients      TEXT NOT NULL DEFAULT '[]',
    sent_at         INTEGER,
    is_read         INTEGER NOT NULL DEFAULT 0,
    is_flagged      INTEGER NOT NULL DEFAULT 0,
    is_deleted      INTEGER NOT NULL DEFAULT 0,
    has_attachments INTEGER NOT NULL DEFAULT 0,
    size            INTEGER NOT NULL DEFAULT 0,
    synced_at       TEXT NOT NULL,
    UNIQUE (account_id, folder_id, uid)
);

CREATE INDEX IF NOT EXISTS idx_messages_folder ON messages(account_id, folder_id);
CREATE INDEX IF NOT EXISTS idx_messages_uid ON messages(uid);
CREATE INDEX IF NOT EXISTS idx_messages_message_id ON messages(message_id);
CREATE INDEX IF NOT EXISTS idx_messages_sent_at ON messages(sent_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_flags ON messages(is_read, is_flagged);
CREATE INDEX IF NOT EXISTS idx_messages_subject ON messages(subject);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);

CREATE TABLE IF NOT EXISTS message_content (
    message_row INTEGER PRIMARY KEY REFERENCES messages(id) ON DELETE CASCADE,
    text_body   TEXT,
    html_body   TEXT,
    raw_headers TEXT NOT NULL DEFAULT '',
    fetched_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    message_row  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    part_index   INTEGER NOT NULL,
    filename     TEXT NOT NULL,
    content_type TEXT NOT NULL,
    size         INTEGER NOT NULL DEFAULT 0,
    data         BLOB,
    path         TEXT,
    UNIQUE (message_row, part_index)
);
";

/// Create any missing tables and record the schema version.
///
/// Version 1 keyed attachment records by file name; they are dropped
/// and refilled on the next content fetch.
pub fn initialize(conn: &Connection) -> Result<()> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta')",
        [],
        |row| row.get(0),
    )?;
    if has_meta && version(conn)? < 2 {
        info!("Upgrading cache schema to version {}", SCHEMA_VERSION);
        conn.execute_batch("DROP TABLE IF EXISTS attachments;")?;
    }
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION.to_string()],
    )?;
    debug!("Cache schema ready (version {})", SCHEMA_VERSION);
    Ok(())
}

/// The schema version recorded in an existing store.
pub fn version(conn: &Connection) -> Result<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    value
        .ok_or_else(|| Error::CacheUnavailable("cache has no schema version".into()))?
        .parse()
        .map_err(|e| Error::CacheUnavailable(format!("bad schema version: {e}")))
}
