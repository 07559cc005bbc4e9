//! SQL migration definitions for the MoonScrape database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

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
        description: "Initial schema: sources, page_content, reports",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Result URLs collected from search
CREATE TABLE IF NOT EXISTS sources (
    id         TEXT PRIMARY KEY,
    url        TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_url ON sources(url);

-- Normalized page text, one row per source
CREATE TABLE IF NOT EXISTS page_content (
    id           TEXT PRIMARY KEY,
    source_id    TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    content      TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at   TEXT NOT NULL,
    UNIQUE(source_id)
);

CREATE INDEX IF NOT EXISTS idx_page_content_hash ON page_content(content_hash);

-- Refined research summaries
CREATE TABLE IF NOT EXISTS reports (
    id         TEXT PRIMARY KEY,
    keyword    TEXT NOT NULL,
    summary    TEXT NOT NULL,
    score      REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_keyword ON reports(keyword);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
