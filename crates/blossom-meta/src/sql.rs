//! SQL metadata backend (SQLite + WAL)
//!
//! Schema and pragmas are exactly as specified (spec §6): three indexes on
//! `blobs`, `journal_mode=WAL`, `synchronous=NORMAL`. Grounded on
//! `harbor-db/src/repository/mod.rs` (migration-on-connect pattern) and
//! `harbor-db/src/repository/cache.rs` (query shape), adapted to this
//! crate's integer-seconds timestamps and tuple-comparator pagination.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::backend::{MetaBackend, DEFAULT_LIST_LIMIT};
use crate::error::MetaError;
use crate::model::{now_unix, BlobMeta, EvictCandidate};

/// A single scan batch for `evict_candidates`; see SPEC_FULL.md Open
/// Question D.3 — the source's unbounded query is replaced with a bounded,
/// re-issued scan.
const EVICT_SCAN_BATCH: i64 = 1000;

pub struct SqlBackend {
    pool: SqlitePool,
}

impl SqlBackend {
    pub async fn open(db_path: &Path) -> Result<Self, MetaError> {
        info!("Opening SQL metadata backend at {:?}", db_path);

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), MetaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                sha256        TEXT PRIMARY KEY NOT NULL,
                size          INTEGER NOT NULL,
                mime_type     TEXT,
                created_at    INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                access_count  INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blobs_last_accessed ON blobs(last_accessed)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blobs_size ON blobs(size)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blobs_created_at ON blobs(created_at)")
            .execute(&self.pool)
            .await?;

        debug!("SQL metadata schema ready");
        Ok(())
    }

    fn row_to_meta(row: &sqlx::sqlite::SqliteRow) -> BlobMeta {
        let mime_type: Option<String> = row.get("mime_type");
        BlobMeta {
            sha256: row.get("sha256"),
            size: row.get("size"),
            mime_type: BlobMeta::normalize_mime(mime_type.as_deref().unwrap_or("")),
            created_at: row.get("created_at"),
            last_accessed: row.get("last_accessed"),
            access_count: {
                let raw: i64 = row.get("access_count");
                raw.max(0) as u32
            },
        }
    }
}

#[async_trait]
impl MetaBackend for SqlBackend {
    async fn contains(&self, sha256: &str) -> bool {
        match sqlx::query("SELECT 1 FROM blobs WHERE sha256 = ?")
            .bind(sha256)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!("contains({}) failed: {}", sha256, e);
                false
            }
        }
    }

    async fn get_info(&self, sha256: &str) -> Option<BlobMeta> {
        let now = now_unix();
        let result = sqlx::query(
            r#"
            UPDATE blobs
            SET last_accessed = ?, access_count = access_count + 1
            WHERE sha256 = ?
            RETURNING sha256, size, mime_type, created_at, last_accessed, access_count
            "#,
        )
        .bind(now)
        .bind(sha256)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Some(Self::row_to_meta(&row)),
            Ok(None) => None,
            Err(e) => {
                warn!("get_info({}) failed: {}", sha256, e);
                None
            }
        }
    }

    async fn total_size(&self) -> i64 {
        match sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM blobs")
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => row.get("total"),
            Err(e) => {
                warn!("total_size failed: {}", e);
                0
            }
        }
    }

    async fn blob_count(&self) -> u32 {
        match sqlx::query("SELECT COUNT(*) AS count FROM blobs")
            .fetch_one(&self.pool)
            .await
        {
            Ok(row) => {
                let count: i64 = row.get("count");
                count.max(0) as u32
            }
            Err(e) => {
                warn!("blob_count failed: {}", e);
                0
            }
        }
    }

    async fn put_meta(&self, meta: BlobMeta) -> Result<(), MetaError> {
        sqlx::query(
            r#"
            INSERT INTO blobs (sha256, size, mime_type, created_at, last_accessed, access_count)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(sha256) DO NOTHING
            "#,
        )
        .bind(&meta.sha256)
        .bind(meta.size)
        .bind(BlobMeta::normalize_mime(&meta.mime_type))
        .bind(meta.created_at)
        .bind(meta.last_accessed)
        .bind(meta.access_count as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_meta(&self, sha256: &str) -> Result<(), MetaError> {
        sqlx::query("DELETE FROM blobs WHERE sha256 = ?")
            .bind(sha256)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_blobs(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<BlobMeta>, MetaError> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit } as i64;

        let rows = if let Some(cursor) = cursor {
            let cursor_row = sqlx::query("SELECT created_at FROM blobs WHERE sha256 = ?")
                .bind(cursor)
                .fetch_optional(&self.pool)
                .await?;

            match cursor_row {
                Some(row) => {
                    let cursor_created_at: i64 = row.get("created_at");
                    sqlx::query(
                        r#"
                        SELECT sha256, size, mime_type, created_at, last_accessed, access_count
                        FROM blobs
                        WHERE (created_at, sha256) < (?, ?)
                        ORDER BY created_at DESC, sha256 DESC
                        LIMIT ?
                        "#,
                    )
                    .bind(cursor_created_at)
                    .bind(cursor)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
                }
                // Cursor no longer exists (evicted/deleted between pages): start over.
                None => {
                    sqlx::query(
                        r#"
                        SELECT sha256, size, mime_type, created_at, last_accessed, access_count
                        FROM blobs
                        ORDER BY created_at DESC, sha256 DESC
                        LIMIT ?
                        "#,
                    )
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
                }
            }
        } else {
            sqlx::query(
                r#"
                SELECT sha256, size, mime_type, created_at, last_accessed, access_count
                FROM blobs
                ORDER BY created_at DESC, sha256 DESC
                LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows.iter().map(Self::row_to_meta).collect())
    }

    async fn evict_candidates(&self, bytes_to_free: i64) -> Result<Vec<EvictCandidate>, MetaError> {
        if bytes_to_free <= 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut freed = 0i64;
        let mut offset = 0i64;

        loop {
            let rows = sqlx::query(
                r#"
                SELECT sha256, size
                FROM blobs
                ORDER BY last_accessed ASC, sha256 ASC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(EVICT_SCAN_BATCH)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            if rows.is_empty() {
                break;
            }

            let got = rows.len() as i64;
            for row in &rows {
                let sha256: String = row.get("sha256");
                let size: i64 = row.get("size");
                freed += size;
                out.push(EvictCandidate { sha256, size });
                if freed >= bytes_to_free {
                    break;
                }
            }

            if freed >= bytes_to_free || got < EVICT_SCAN_BATCH {
                break;
            }
            offset += got;
        }

        Ok(out)
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn destroy(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> SqlBackend {
        let dir = tempfile::tempdir().unwrap();
        SqlBackend::open(&dir.path().join("blobs.db")).await.unwrap()
    }

    fn meta(sha256: &str, created_at: i64) -> BlobMeta {
        BlobMeta {
            sha256: sha256.to_string(),
            size: 10,
            mime_type: "text/plain".to_string(),
            created_at,
            last_accessed: created_at,
            access_count: 0,
        }
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let backend = backend().await;
        let h = "a".repeat(64);
        backend.put_meta(meta(&h, 1)).await.unwrap();
        backend.put_meta(meta(&h, 999)).await.unwrap();
        let info = backend.get_info(&h).await.unwrap();
        // Second put_meta must not overwrite created_at.
        assert_eq!(info.created_at, 1);
    }

    #[tokio::test]
    async fn get_info_advances_access_count() {
        let backend = backend().await;
        let h = "b".repeat(64);
        backend.put_meta(meta(&h, 1)).await.unwrap();
        backend.get_info(&h).await.unwrap();
        let info = backend.get_info(&h).await.unwrap();
        assert_eq!(info.access_count, 2);
    }

    #[tokio::test]
    async fn list_blobs_paginates_without_overlap() {
        let backend = backend().await;
        for i in 0..10 {
            let h = format!("{:064x}", i);
            backend.put_meta(meta(&h, i)).await.unwrap();
        }

        let page1 = backend.list_blobs(None, 4).await.unwrap();
        assert_eq!(page1.len(), 4);
        let cursor = page1.last().unwrap().sha256.clone();

        let page2 = backend.list_blobs(Some(&cursor), 4).await.unwrap();
        assert_eq!(page2.len(), 4);

        let seen: std::collections::HashSet<_> =
            page1.iter().chain(page2.iter()).map(|m| m.sha256.clone()).collect();
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn evict_candidates_sorted_by_access_time() {
        let backend = backend().await;
        backend.put_meta(meta("1".repeat(64).as_str(), 1)).await.unwrap();
        backend.put_meta(meta("2".repeat(64).as_str(), 2)).await.unwrap();
        backend.get_info(&"2".repeat(64)).await; // bump 2's last_accessed ahead

        let candidates = backend.evict_candidates(5).await.unwrap();
        assert_eq!(candidates[0].sha256, "1".repeat(64));
    }
}
