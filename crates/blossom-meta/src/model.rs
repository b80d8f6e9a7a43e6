//! Canonical metadata record

/// Metadata for one cached blob, keyed by its SHA-256 digest.
///
/// Every field except `sha256` may mutate after creation: `last_accessed`
/// and `access_count` advance on each successful read (I4, I5 in spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub sha256: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: i64,
    pub last_accessed: i64,
    pub access_count: u32,
}

impl BlobMeta {
    /// Normalize an empty or missing MIME type to the spec-mandated default.
    pub fn normalize_mime(mime_type: &str) -> String {
        if mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type.to_string()
        }
    }
}

/// One entry returned by `evict_candidates`: enough to delete a blob and
/// track bytes freed without fetching the full record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictCandidate {
    pub sha256: String,
    pub size: i64,
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
