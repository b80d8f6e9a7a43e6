//! Metadata backend error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("sqlite error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("lmdb error: {0}")]
    Kv(#[from] heed::Error),

    #[error("background task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt metadata record: {0}")]
    Corrupt(String),
}
