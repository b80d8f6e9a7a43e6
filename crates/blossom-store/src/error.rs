//! Blob store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Meta(#[from] blossom_meta::MetaError),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("blob not found: {0}")]
    NotFound(String),
}
