//! The MetaBackend abstraction (spec §4.1)
//!
//! Two concrete implementations exist ([`crate::sql::SqlBackend`] and
//! [`crate::kv::KvBackend`]) with identical observable behavior. Callers
//! hold an `Arc<dyn MetaBackend>` and never need to know which one they
//! have — the selection happens once at startup (see
//! [`crate::open_meta_backend`]).

use async_trait::async_trait;

use crate::error::MetaError;
use crate::model::{BlobMeta, EvictCandidate};

/// Default page size for `list_blobs` when the caller passes `limit == 0`.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

#[async_trait]
pub trait MetaBackend: Send + Sync {
    /// Existence check. No side effects; backend errors are treated as a miss.
    async fn contains(&self, sha256: &str) -> bool;

    /// Fetch metadata, touching `last_accessed`/`access_count` on a hit.
    /// Returns `None` on a miss or on any backend error.
    async fn get_info(&self, sha256: &str) -> Option<BlobMeta>;

    /// Sum of `size` across all rows. Returns 0 on error.
    async fn total_size(&self) -> i64;

    /// Row count. Returns 0 on error.
    async fn blob_count(&self) -> u32;

    /// Idempotent insert: if a row with the same key exists, this is a no-op.
    async fn put_meta(&self, meta: BlobMeta) -> Result<(), MetaError>;

    /// Remove a row and its index entries. Missing key is not an error.
    async fn delete_meta(&self, sha256: &str) -> Result<(), MetaError>;

    /// Page through blobs, sorted DESC by `(created_at, sha256)`. `cursor`
    /// is the last digest of the previous page and is excluded from this
    /// one. `limit == 0` means [`DEFAULT_LIST_LIMIT`].
    async fn list_blobs(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<BlobMeta>, MetaError>;

    /// Candidates for LRU eviction, sorted ASC by `last_accessed`,
    /// accumulated until `Σ size ≥ bytes_to_free`.
    async fn evict_candidates(&self, bytes_to_free: i64) -> Result<Vec<EvictCandidate>, MetaError>;

    /// Whether state survives a process restart.
    fn is_persistent(&self) -> bool;

    /// Release all backend resources. Idempotent.
    async fn destroy(&self);
}
