//! SQL migration definitions for the civicmap database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: messages",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested announcements and their derived data (JSON columns)
CREATE TABLE IF NOT EXISTS messages (
    id             TEXT PRIMARY KEY,
    text           TEXT NOT NULL,
    source         TEXT NOT NULL,
    stage          TEXT NOT NULL,
    extracted_data TEXT,
    addresses      TEXT,
    geo_json       TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
