//! Shared application state (spec §3 "Ownership")

use std::sync::Arc;

use blossom_core::CacheManager;
use blossom_store::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BlobStore>,
    pub cache: Arc<CacheManager>,
    /// Own scheme/host/port, used to build absolute URLs in Blob Descriptors.
    pub base_url: String,
}

impl AppState {
    pub fn new(store: Arc<BlobStore>, cache: Arc<CacheManager>, base_url: String) -> Self {
        Self {
            store,
            cache,
            base_url,
        }
    }
}
