//! KV metadata backend (memory-mapped LMDB via `heed`)
//!
//! Three named sub-databases under one `heed::Env`:
//!
//! - `blobs`: `sha256 (64-byte hex string) -> packed record` (size,
//!   created_at, last_accessed, access_count, mime_type)
//! - `by_access`: `last_accessed:be(8) ++ sha256(64) -> ()`, a secondary
//!   index kept in sync with `blobs` for ascending-LRU scans
//! - `by_created`: `created_at:be(8) ++ sha256(64) -> ()`, for descending
//!   time-ordered pagination
//!
//! Keys are the literal lowercase hex digest, not the decoded 32 raw bytes:
//! this is what keeps the 72-byte index key width (8 + 64) and lets key
//! comparisons double as digest comparisons without a decode step.
//!
//! Primary record values are little-endian fixed-width:
//! `[i64 size][i64 created_at][i64 last_accessed][u32 access_count][u32 mime_len][mime_len bytes]`.
//! Index keys are big-endian so lexicographic byte order matches numeric
//! order. Mixing the two is deliberate (see SPEC_FULL.md's endianness note)
//! and must not be "simplified" to one endianness.
//!
//! `list_blobs`/`evict_candidates` page over these secondary indexes with a
//! strict `<` byte-comparison on the full `timestamp ++ digest` key, the
//! same tie-break the SQL backend expresses as `(created_at, sha256) < (?, ?)`
//! (SPEC_FULL.md Open Question D.1) — this avoids the skip/duplicate bug a
//! bare SET_RANGE+PREV walk has at cursor edges.
//!
//! All mutation (`put_meta`, `delete_meta`, the touch in `get_info`) keeps
//! the primary row and both index entries consistent within one `RwTxn`.
//! `heed`'s cursors are synchronous, so every operation runs inside
//! `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::warn;

use crate::backend::{MetaBackend, DEFAULT_LIST_LIMIT};
use crate::error::MetaError;
use crate::model::{now_unix, BlobMeta, EvictCandidate};

/// Matches spec §6's "Initial map size 256 MiB unless overridden" default.
const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;
const DIGEST_HEX_LEN: usize = 64;

type Table = Database<Bytes, Bytes>;

struct Inner {
    env: Env,
    blobs: Table,
    by_access: Table,
    by_created: Table,
}

pub struct KvBackend {
    inner: Arc<Inner>,
}

fn is_valid_digest(sha256: &str) -> bool {
    sha256.len() == DIGEST_HEX_LEN && sha256.bytes().all(|b| b.is_ascii_hexdigit())
}

fn pack_record(meta: &BlobMeta) -> Vec<u8> {
    let mime = meta.mime_type.as_bytes();
    let mut buf = Vec::with_capacity(8 + 8 + 8 + 4 + 4 + mime.len());
    buf.extend_from_slice(&meta.size.to_le_bytes());
    buf.extend_from_slice(&meta.created_at.to_le_bytes());
    buf.extend_from_slice(&meta.last_accessed.to_le_bytes());
    buf.extend_from_slice(&meta.access_count.to_le_bytes());
    buf.extend_from_slice(&(mime.len() as u32).to_le_bytes());
    buf.extend_from_slice(mime);
    buf
}

fn unpack_record(sha256: String, raw: &[u8]) -> Option<BlobMeta> {
    if raw.len() < 32 {
        return None;
    }
    let size = i64::from_le_bytes(raw[0..8].try_into().ok()?);
    let created_at = i64::from_le_bytes(raw[8..16].try_into().ok()?);
    let last_accessed = i64::from_le_bytes(raw[16..24].try_into().ok()?);
    let access_count = u32::from_le_bytes(raw[24..28].try_into().ok()?);
    let mime_len = u32::from_le_bytes(raw[28..32].try_into().ok()?) as usize;
    let mime_type = String::from_utf8(raw.get(32..32 + mime_len)?.to_vec()).ok()?;
    Some(BlobMeta {
        sha256,
        size,
        mime_type: BlobMeta::normalize_mime(&mime_type),
        created_at,
        last_accessed,
        access_count,
    })
}

fn index_key(timestamp: i64, sha256: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + DIGEST_HEX_LEN);
    key.extend_from_slice(&timestamp.to_be_bytes());
    key.extend_from_slice(sha256.as_bytes());
    key
}

fn digest_from_index_key(key: &[u8]) -> Option<String> {
    let digest = key.get(8..8 + DIGEST_HEX_LEN)?;
    String::from_utf8(digest.to_vec()).ok()
}

impl Inner {
    fn get_locked(&self, ro: &RoTxn, sha256: &str) -> Result<Option<BlobMeta>, MetaError> {
        match self.blobs.get(ro, sha256.as_bytes())? {
            Some(raw) => Ok(unpack_record(sha256.to_string(), raw)),
            None => Ok(None),
        }
    }

    fn put_locked(&self, wtxn: &mut RwTxn, meta: &BlobMeta) -> Result<(), MetaError> {
        if !is_valid_digest(&meta.sha256) {
            return Err(MetaError::Corrupt(format!("bad digest: {}", meta.sha256)));
        }

        if self.blobs.get(wtxn, meta.sha256.as_bytes())?.is_some() {
            return Ok(()); // idempotent insert
        }

        self.blobs.put(wtxn, meta.sha256.as_bytes(), &pack_record(meta))?;
        self.by_access
            .put(wtxn, &index_key(meta.last_accessed, &meta.sha256), &[])?;
        self.by_created
            .put(wtxn, &index_key(meta.created_at, &meta.sha256), &[])?;
        Ok(())
    }

    fn delete_locked(&self, wtxn: &mut RwTxn, sha256: &str) -> Result<(), MetaError> {
        if let Some(raw) = self.blobs.get(wtxn, sha256.as_bytes())? {
            if let Some(meta) = unpack_record(sha256.to_string(), raw) {
                self.by_access
                    .delete(wtxn, &index_key(meta.last_accessed, sha256))?;
                self.by_created
                    .delete(wtxn, &index_key(meta.created_at, sha256))?;
            }
        }
        self.blobs.delete(wtxn, sha256.as_bytes())?;
        Ok(())
    }

    fn touch_locked(&self, wtxn: &mut RwTxn, sha256: &str) -> Result<Option<BlobMeta>, MetaError> {
        let raw = match self.blobs.get(wtxn, sha256.as_bytes())? {
            Some(raw) => raw.to_vec(),
            None => return Ok(None),
        };
        let mut meta = match unpack_record(sha256.to_string(), &raw) {
            Some(m) => m,
            None => return Ok(None),
        };

        self.by_access
            .delete(wtxn, &index_key(meta.last_accessed, sha256))?;
        meta.last_accessed = now_unix();
        meta.access_count += 1;
        self.by_access
            .put(wtxn, &index_key(meta.last_accessed, sha256), &[])?;
        self.blobs.put(wtxn, sha256.as_bytes(), &pack_record(&meta))?;

        Ok(Some(meta))
    }
}

impl KvBackend {
    pub async fn open(db_path: &Path) -> Result<Self, MetaError> {
        std::fs::create_dir_all(db_path)?;
        let path = db_path.to_path_buf();

        let inner = tokio::task::spawn_blocking(move || -> Result<Inner, MetaError> {
            // SAFETY: this is the only place the environment is opened, and
            // it outlives every handle derived from it via the shared Arc.
            let env = unsafe {
                EnvOpenOptions::new()
                    .map_size(DEFAULT_MAP_SIZE)
                    .max_dbs(3)
                    .open(&path)?
            };

            let mut wtxn = env.write_txn()?;
            let blobs: Table = env.create_database(&mut wtxn, Some("blobs"))?;
            let by_access: Table = env.create_database(&mut wtxn, Some("by_access"))?;
            let by_created: Table = env.create_database(&mut wtxn, Some("by_created"))?;
            wtxn.commit()?;

            Ok(Inner {
                env,
                blobs,
                by_access,
                by_created,
            })
        })
        .await??;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

#[async_trait]
impl MetaBackend for KvBackend {
    async fn contains(&self, sha256: &str) -> bool {
        if !is_valid_digest(sha256) {
            return false;
        }
        let sha256 = sha256.to_string();
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<bool, MetaError> {
            let ro = inner.env.read_txn()?;
            Ok(inner.blobs.get(&ro, sha256.as_bytes())?.is_some())
        })
        .await;

        match result {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                warn!("contains failed: {}", e);
                false
            }
            Err(e) => {
                warn!("contains join error: {}", e);
                false
            }
        }
    }

    async fn get_info(&self, sha256: &str) -> Option<BlobMeta> {
        if !is_valid_digest(sha256) {
            return None;
        }
        let sha256 = sha256.to_string();
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<Option<BlobMeta>, MetaError> {
            let mut wtxn = inner.env.write_txn()?;
            let meta = inner.touch_locked(&mut wtxn, &sha256)?;
            wtxn.commit()?;
            Ok(meta)
        })
        .await;

        match result {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                warn!("get_info failed: {}", e);
                None
            }
            Err(e) => {
                warn!("get_info join error: {}", e);
                None
            }
        }
    }

    async fn total_size(&self) -> i64 {
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<i64, MetaError> {
            let ro = inner.env.read_txn()?;
            let mut total = 0i64;
            for entry in inner.blobs.iter(&ro)? {
                let (digest, raw) = entry?;
                if let Some(meta) = unpack_record(String::from_utf8_lossy(digest).into_owned(), raw) {
                    total += meta.size;
                }
            }
            Ok(total)
        })
        .await;

        match result {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                warn!("total_size failed: {}", e);
                0
            }
            Err(e) => {
                warn!("total_size join error: {}", e);
                0
            }
        }
    }

    async fn blob_count(&self) -> u32 {
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<u32, MetaError> {
            let ro = inner.env.read_txn()?;
            Ok(inner.blobs.len(&ro)? as u32)
        })
        .await;

        match result {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                warn!("blob_count failed: {}", e);
                0
            }
            Err(e) => {
                warn!("blob_count join error: {}", e);
                0
            }
        }
    }

    async fn put_meta(&self, meta: BlobMeta) -> Result<(), MetaError> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<(), MetaError> {
            let mut wtxn = inner.env.write_txn()?;
            inner.put_locked(&mut wtxn, &meta)?;
            wtxn.commit()?;
            Ok(())
        })
        .await?
    }

    async fn delete_meta(&self, sha256: &str) -> Result<(), MetaError> {
        if !is_valid_digest(sha256) {
            return Ok(());
        }
        let sha256 = sha256.to_string();
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<(), MetaError> {
            let mut wtxn = inner.env.write_txn()?;
            inner.delete_locked(&mut wtxn, &sha256)?;
            wtxn.commit()?;
            Ok(())
        })
        .await?
    }

    async fn list_blobs(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<BlobMeta>, MetaError> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit } as usize;
        let cursor = cursor.filter(|c| is_valid_digest(c)).map(|c| c.to_string());
        let inner = self.inner.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<BlobMeta>, MetaError> {
            let ro = inner.env.read_txn()?;

            let start_key = match &cursor {
                Some(sha256) => inner
                    .get_locked(&ro, sha256)?
                    .map(|meta| index_key(meta.created_at, sha256)),
                None => None,
            };

            let mut out = Vec::with_capacity(limit);
            let mut past_cursor = start_key.is_none();

            for entry in inner.by_created.rev_iter(&ro)? {
                let (key, _) = entry?;
                if !past_cursor {
                    if key < start_key.as_deref().unwrap() {
                        past_cursor = true;
                    } else {
                        continue;
                    }
                }
                if out.len() >= limit {
                    break;
                }
                if let Some(sha256) = digest_from_index_key(key) {
                    if let Some(meta) = inner.get_locked(&ro, &sha256)? {
                        out.push(meta);
                    }
                }
            }

            Ok(out)
        })
        .await?
    }

    async fn evict_candidates(&self, bytes_to_free: i64) -> Result<Vec<EvictCandidate>, MetaError> {
        if bytes_to_free <= 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<EvictCandidate>, MetaError> {
            let ro = inner.env.read_txn()?;
            let mut out = Vec::new();
            let mut freed = 0i64;

            for entry in inner.by_access.iter(&ro)? {
                let (key, _) = entry?;
                let sha256 = match digest_from_index_key(key) {
                    Some(s) => s,
                    None => continue,
                };
                if let Some(meta) = inner.get_locked(&ro, &sha256)? {
                    freed += meta.size;
                    out.push(EvictCandidate {
                        sha256: meta.sha256,
                        size: meta.size,
                    });
                    if freed >= bytes_to_free {
                        break;
                    }
                }
            }

            Ok(out)
        })
        .await?
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn destroy(&self) {
        // heed flushes on drop; nothing to do until the last Arc clone is gone.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> KvBackend {
        let dir = tempfile::tempdir().unwrap();
        KvBackend::open(dir.path()).await.unwrap()
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
    async fn delete_removes_index_entries() {
        let backend = backend().await;
        let h = "c".repeat(64);
        backend.put_meta(meta(&h, 1)).await.unwrap();
        backend.delete_meta(&h).await.unwrap();
        assert!(!backend.contains(&h).await);
        assert_eq!(backend.evict_candidates(1).await.unwrap().len(), 0);
    }
}
