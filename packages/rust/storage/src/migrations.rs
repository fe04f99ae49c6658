//! SQL migration definitions for the wikisearch database.
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
    vec![
        Migration {
            version: 1,
            description: "Initial schema: topics, topic_versions, documents",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Wiki pages
CREATE TABLE IF NOT EXISTS topics (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    page_name TEXT NOT NULL UNIQUE
);

-- Revisions of each page's markup
CREATE TABLE IF NOT EXISTS topic_versions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id     INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    wiki_content TEXT,
    edited_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_topic_versions_topic ON topic_versions(topic_id, edited_at);

-- Submitted search documents
CREATE TABLE IF NOT EXISTS documents (
    uid        TEXT PRIMARY KEY,
    url        TEXT NOT NULL,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    site       TEXT NOT NULL,
    doc_type   TEXT NOT NULL,
    date       TEXT,
    indexed_at TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Indexing run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS index_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
