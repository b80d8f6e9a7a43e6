//! Cache manager error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] blossom_store::StoreError),

    #[error("upstream error: {0}")]
    Upstream(#[from] blossom_upstream::UpstreamError),

    #[error("blob not found")]
    NotFound,

    #[error("blob exceeds the configured per-blob size cap")]
    TooLarge,

    #[error("eviction candidate lookup failed while admitting a new blob")]
    EvictionFailed,
}
