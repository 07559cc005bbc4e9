//! libSQL storage layer for collected sources, page content, and reports.
//!
//! The [`Storage`] struct wraps a local libSQL database. Sources are
//! deduplicated by URL, page content is upserted per source with a SHA-256
//! hash, and each completed refinement run is recorded as a report.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use moonscrape_shared::{MoonscrapeError, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A stored refinement report row.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: String,
    pub keyword: String,
    pub summary: String,
    pub score: f64,
    pub created_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MoonscrapeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode. Migrations are not
    /// applied.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    MoonscrapeError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Reject write operations on read-only handles.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(MoonscrapeError::Storage(
                "database is opened read-only".into(),
            ));
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Source operations
    // -----------------------------------------------------------------------

    /// Record a source URL, returning its ID.
    ///
    /// Idempotent: inserting the same URL again returns the existing ID.
    pub async fn insert_source(&self, url: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO sources (id, url, created_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), url, now.as_str()],
            )
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let mut rows = self
            .conn
            .query("SELECT id FROM sources WHERE url = ?1", params![url])
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map_err(|e| MoonscrapeError::Storage(e.to_string())),
            Ok(None) => Err(MoonscrapeError::Storage(format!(
                "source vanished after insert: {url}"
            ))),
            Err(e) => Err(MoonscrapeError::Storage(e.to_string())),
        }
    }

    /// List all recorded source URLs in insertion order.
    pub async fn list_sources(&self) -> Result<Vec<(String, String)>> {
        let mut rows = self
            .conn
            .query("SELECT id, url FROM sources ORDER BY created_at", params![])
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push((
                row.get::<String>(0)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
                row.get::<String>(1)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
            ));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Page content operations
    // -----------------------------------------------------------------------

    /// Upsert normalized page text for a source.
    pub async fn save_content(&self, source_id: &str, content: &str) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let hash = compute_hash(content);
        self.conn
            .execute(
                "INSERT INTO page_content (id, source_id, content, content_hash, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(source_id) DO UPDATE SET
                   content = excluded.content,
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at",
                params![
                    id.as_str(),
                    source_id,
                    content,
                    hash.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Fetch stored page text by source URL.
    pub async fn get_content(&self, url: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.content FROM page_content c
                 JOIN sources s ON s.id = c.source_id
                 WHERE s.url = ?1",
                params![url],
            )
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<String>(0)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(MoonscrapeError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Report operations
    // -----------------------------------------------------------------------

    /// Record a completed refinement run.
    pub async fn insert_report(&self, keyword: &str, summary: &str, score: f64) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO reports (id, keyword, summary, score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), keyword, summary, score, now.as_str()],
            )
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// List stored reports, most recent first.
    pub async fn list_reports(&self) -> Result<Vec<ReportRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, keyword, summary, score, created_at
                 FROM reports ORDER BY created_at DESC",
                params![],
            )
            .await
            .map_err(|e| MoonscrapeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ReportRow {
                id: row
                    .get::<String>(0)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
                keyword: row
                    .get::<String>(1)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
                summary: row
                    .get::<String>(2)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
                score: row
                    .get::<f64>(3)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
                created_at: row
                    .get::<String>(4)
                    .map_err(|e| MoonscrapeError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }
}

/// Compute a SHA-256 hash of content, hex-encoded.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
