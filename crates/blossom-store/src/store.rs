//! BlobStore: filesystem content layered over a MetaBackend (spec §4.2)

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use blossom_meta::{now_unix, BlobMeta, MetaBackend};

use crate::error::StoreError;
use crate::path::{compute_sha256, content_path, validate_digest};

pub struct BlobStore {
    root: PathBuf,
    meta: Arc<dyn MetaBackend>,
}

impl BlobStore {
    pub async fn new(root: PathBuf, meta: Arc<dyn MetaBackend>) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join("blobs")).await?;
        info!("Blob store rooted at {:?}", root);
        Ok(Self { root, meta })
    }

    /// Delegates to metadata only, per spec §4.2 — does not stat the file.
    pub async fn contains(&self, sha256: &str) -> bool {
        if validate_digest(sha256).is_err() {
            return false;
        }
        self.meta.contains(sha256).await
    }

    pub async fn get_info(&self, sha256: &str) -> Result<BlobMeta, StoreError> {
        validate_digest(sha256)?;
        self.meta
            .get_info(sha256)
            .await
            .ok_or_else(|| StoreError::NotFound(sha256.to_string()))
    }

    pub async fn read_content(&self, sha256: &str) -> Result<Bytes, StoreError> {
        validate_digest(sha256)?;
        let path = content_path(&self.root, sha256);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(sha256.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Insert `data` under key `sha256`. Idempotent on an existing key.
    pub async fn put(
        &self,
        sha256: &str,
        data: Bytes,
        mime_type: &str,
        verify: bool,
    ) -> Result<BlobMeta, StoreError> {
        validate_digest(sha256)?;

        if self.meta.contains(sha256).await {
            debug!("put({}) already present, skipping write", sha256);
            return self.get_info(sha256).await;
        }

        if verify {
            let computed = compute_sha256(&data);
            if computed != sha256 {
                return Err(StoreError::HashMismatch {
                    expected: sha256.to_string(),
                    computed,
                });
            }
        }

        let path = content_path(&self.root, sha256);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            // Best-effort: the write is already durable via POSIX rename once
            // this returns, so a sync failure is a warning, not an error
            // (spec §4.2 step 4: fsync is optional for correctness).
            if let Err(e) = file.sync_all().await {
                warn!("fsync failed for {}, continuing: {}", sha256, e);
            }
        }
        fs::rename(&tmp_path, &path).await?;

        let now = now_unix();
        let meta = BlobMeta {
            sha256: sha256.to_string(),
            size: data.len() as i64,
            mime_type: BlobMeta::normalize_mime(mime_type),
            created_at: now,
            last_accessed: now,
            access_count: 0,
        };

        if let Err(e) = self.meta.put_meta(meta.clone()).await {
            warn!("metadata insert failed for {}, unlinking content: {}", sha256, e);
            let _ = fs::remove_file(&path).await;
            return Err(StoreError::Meta(e));
        }

        Ok(meta)
    }

    /// Content goes first so a crash between the two leaves only the
    /// invariant-safe state (content gone, metadata stale) rather than a
    /// dangling metadata row with no backing file (spec §4.2).
    pub async fn delete(&self, sha256: &str) -> Result<bool, StoreError> {
        validate_digest(sha256)?;
        let path = content_path(&self.root, sha256);

        let existed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(StoreError::Io(e)),
        };

        self.meta.delete_meta(sha256).await?;
        Ok(existed)
    }

    /// Evicts LRU candidates until `bytes_to_free` is met. Returns the
    /// count evicted, or `-1` if the candidate lookup itself failed.
    pub async fn evict_lru(&self, bytes_to_free: i64) -> i64 {
        let candidates = match self.meta.evict_candidates(bytes_to_free).await {
            Ok(c) => c,
            Err(e) => {
                warn!("evict_candidates failed: {}", e);
                return -1;
            }
        };

        let mut evicted = 0i64;
        let mut freed = 0i64;
        for candidate in candidates {
            match self.delete(&candidate.sha256).await {
                Ok(_) => {
                    evicted += 1;
                    freed += candidate.size;
                }
                Err(e) => warn!("evict delete({}) failed, skipping: {}", candidate.sha256, e),
            }
            if freed >= bytes_to_free {
                break;
            }
        }
        evicted
    }

    pub async fn list_blobs(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<BlobMeta>, StoreError> {
        Ok(self.meta.list_blobs(cursor, limit).await?)
    }

    pub async fn total_size(&self) -> i64 {
        self.meta.total_size().await
    }

    pub async fn blob_count(&self) -> u32 {
        self.meta.blob_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blossom_meta::{open_meta_backend, BackendKind};

    async fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let meta = open_meta_backend(BackendKind::Sql, dir.path()).await.unwrap();
        let store = BlobStore::new(dir.path().join("store"), meta).await.unwrap();
        (dir, store)
    }

    fn hello_digest() -> &'static str {
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    }

    #[tokio::test]
    async fn put_then_read_round_trips() {
        let (_dir, store) = store().await;
        let h = hello_digest();
        store.put(h, Bytes::from_static(b"hello"), "text/plain", true).await.unwrap();
        let data = store.read_content(h).await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn put_rejects_hash_mismatch() {
        let (_dir, store) = store().await;
        let wrong = "a".repeat(64);
        let err = store.put(&wrong, Bytes::from_static(b"hello"), "text/plain", true).await;
        assert!(matches!(err, Err(StoreError::HashMismatch { .. })));
        assert!(!store.contains(&wrong).await);
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let (_dir, store) = store().await;
        let h = hello_digest();
        store.put(h, Bytes::from_static(b"hello"), "text/plain", true).await.unwrap();
        store.put(h, Bytes::from_static(b"hello"), "text/plain", true).await.unwrap();
        assert_eq!(store.blob_count().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_content_and_metadata() {
        let (_dir, store) = store().await;
        let h = hello_digest();
        store.put(h, Bytes::from_static(b"hello"), "text/plain", true).await.unwrap();
        assert!(store.delete(h).await.unwrap());
        assert!(!store.contains(h).await);
        assert!(matches!(store.read_content(h).await, Err(StoreError::NotFound(_))));
    }
}
