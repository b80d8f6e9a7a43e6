//! CacheManager: local-first lookup, upstream fetch, size admission, eviction (spec §4.4)

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use blossom_meta::{now_unix, BlobMeta};
use blossom_store::BlobStore;
use blossom_upstream::UpstreamClient;

use crate::error::CoreError;

/// Policy parameters; `0` or negative disables the corresponding cap.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_cache_bytes: i64,
    pub max_blob_bytes: i64,
    pub verify_hash: bool,
}

/// Borrows one [`BlobStore`] and one [`UpstreamClient`]; owns neither (spec §9).
pub struct CacheManager {
    store: Arc<BlobStore>,
    upstream: Arc<UpstreamClient>,
    config: CacheConfig,
}

fn synthesized_info(sha256: &str, size: i64, mime_type: Option<String>) -> BlobMeta {
    let now = now_unix();
    BlobMeta {
        sha256: sha256.to_string(),
        size,
        mime_type: BlobMeta::normalize_mime(mime_type.as_deref().unwrap_or("")),
        created_at: now,
        last_accessed: now,
        access_count: 0,
    }
}

impl CacheManager {
    pub fn new(store: Arc<BlobStore>, upstream: Arc<UpstreamClient>, config: CacheConfig) -> Self {
        Self {
            store,
            upstream,
            config,
        }
    }

    pub fn store(&self) -> &Arc<BlobStore> {
        &self.store
    }

    async fn evict_for(&self, incoming_size: i64) {
        if self.config.max_cache_bytes <= 0 {
            return;
        }
        let current = self.store.total_size().await;
        let needed = current + incoming_size - self.config.max_cache_bytes;
        if needed > 0 {
            let evicted = self.store.evict_lru(needed).await;
            if evicted < 0 {
                warn!("eviction candidate lookup failed while admitting {} bytes", incoming_size);
            } else {
                debug!("evicted {} blobs to admit {} bytes", evicted, incoming_size);
            }
        }
    }

    /// GET path: local-first, fall back to upstream with failover.
    pub async fn get(&self, sha256: &str, hints: &[String]) -> Result<(Bytes, BlobMeta), CoreError> {
        if self.store.contains(sha256).await {
            let info = self.store.get_info(sha256).await?;
            let data = self.store.read_content(sha256).await?;
            debug!("cache hit for {}", sha256);
            return Ok((data, info));
        }

        debug!("cache miss for {}, fetching upstream", sha256);
        let fetched = match self.upstream.fetch(sha256, hints).await {
            Ok(f) => f,
            // spec §4.5: NotFound (every server said 404) maps to the HTTP
            // layer's 404, distinct from AllFailed's 502 — surface it as
            // CoreError::NotFound rather than burying it in CoreError::Upstream.
            Err(blossom_upstream::UpstreamError::NotFound) => return Err(CoreError::NotFound),
            Err(e) => return Err(CoreError::Upstream(e)),
        };

        if self.config.max_blob_bytes > 0 && fetched.data.len() as i64 > self.config.max_blob_bytes {
            info!("{} exceeds max-blob-size, serving without caching", sha256);
            let info = synthesized_info(sha256, fetched.data.len() as i64, fetched.mime_type);
            return Ok((fetched.data, info));
        }

        self.evict_for(fetched.data.len() as i64).await;

        let mime = fetched.mime_type.clone().unwrap_or_default();
        match self.store.put(sha256, fetched.data.clone(), &mime, self.config.verify_hash).await {
            Ok(info) => Ok((fetched.data, info)),
            Err(e) => {
                warn!("failed to cache {} after upstream fetch, serving anyway: {}", sha256, e);
                let info = synthesized_info(sha256, fetched.data.len() as i64, fetched.mime_type);
                Ok((fetched.data, info))
            }
        }
    }

    /// PUT path: authoritative upload, enforces size cap and propagates eviction failures.
    pub async fn put(&self, sha256: &str, data: Bytes, mime_type: &str) -> Result<BlobMeta, CoreError> {
        if self.config.max_blob_bytes > 0 && data.len() as i64 > self.config.max_blob_bytes {
            return Err(CoreError::TooLarge);
        }

        if self.config.max_cache_bytes > 0 {
            let current = self.store.total_size().await;
            let needed = current + data.len() as i64 - self.config.max_cache_bytes;
            if needed > 0 {
                let evicted = self.store.evict_lru(needed).await;
                if evicted < 0 {
                    return Err(CoreError::EvictionFailed);
                }
            }
        }

        Ok(self.store.put(sha256, data, mime_type, self.config.verify_hash).await?)
    }

    /// Opportunistic sweep: evicts the overage, or 0 if under the cap or the cap is disabled.
    pub async fn run_eviction(&self) -> i64 {
        if self.config.max_cache_bytes <= 0 {
            return 0;
        }
        let current = self.store.total_size().await;
        let overage = current - self.config.max_cache_bytes;
        if overage <= 0 {
            return 0;
        }
        let evicted = self.store.evict_lru(overage).await;
        evicted.max(0)
    }

    pub async fn total_size(&self) -> i64 {
        self.store.total_size().await
    }

    pub async fn blob_count(&self) -> u32 {
        self.store.blob_count().await
    }
}

/// Spawns a background task that calls [`CacheManager::run_eviction`] on a
/// fixed interval. Mirrors `harbor-core`'s `spawn_cleanup_task`, trimmed of
/// the TTL/retention sweep the teacher also runs there — this cache has no
/// expiry, only the size cap (spec §4.4's `run_eviction`).
pub fn spawn_eviction_task(
    cache: Arc<CacheManager>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    use tokio::time::{interval, Duration};

    info!(
        "starting background eviction sweep (interval: {}s)",
        interval_secs
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs));
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            ticker.tick().await;
            let evicted = cache.run_eviction().await;
            if evicted > 0 {
                info!("scheduled eviction swept {} blobs", evicted);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blossom_meta::{open_meta_backend, BackendKind};

    async fn manager(max_cache_bytes: i64, max_blob_bytes: i64) -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let meta = open_meta_backend(BackendKind::Sql, dir.path()).await.unwrap();
        let store = BlobStore::new(dir.path().join("store"), meta).await.unwrap();
        let upstream = UpstreamClient::new(vec![]);
        let config = CacheConfig {
            max_cache_bytes,
            max_blob_bytes,
            verify_hash: true,
        };
        (dir, CacheManager::new(Arc::new(store), Arc::new(upstream), config))
    }

    fn hello_digest() -> &'static str {
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    }

    #[tokio::test]
    async fn put_then_get_serves_from_local_store() {
        let (_dir, manager) = manager(0, 0).await;
        let h = hello_digest();
        manager.put(h, Bytes::from_static(b"hello"), "text/plain").await.unwrap();

        let (data, info) = manager.get(h, &[]).await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert_eq!(info.access_count, 1); // get_info touch inside get()
    }

    #[tokio::test]
    async fn put_rejects_oversized_blob() {
        let (_dir, manager) = manager(0, 1).await;
        let h = hello_digest();
        let err = manager.put(h, Bytes::from_static(b"hello"), "text/plain").await;
        assert!(matches!(err, Err(CoreError::TooLarge)));
    }

    #[tokio::test]
    async fn run_eviction_noop_under_cap() {
        let (_dir, manager) = manager(0, 0).await;
        assert_eq!(manager.run_eviction().await, 0);
    }
}
