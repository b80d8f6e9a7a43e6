//! Metadata backend abstraction for Blossom Cache.
//!
//! Two interchangeable implementations live here: [`sql::SqlBackend`]
//! (SQLite, durable, suited to single-node deployments that want an easy
//! `.db` file to back up) and [`kv::KvBackend`] (memory-mapped LMDB via
//! `heed`, suited to high read concurrency). Both satisfy [`backend::MetaBackend`]
//! with identical observable behavior — see spec §4.1 and §8 P7.

pub mod backend;
pub mod error;
pub mod kv;
pub mod model;
pub mod sql;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, warn};

pub use backend::MetaBackend;
pub use error::MetaError;
pub use model::{now_unix, BlobMeta, EvictCandidate};

/// Which concrete backend to open, as selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sql,
    Kv,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" | "sqlite" => Ok(BackendKind::Sql),
            "kv" | "lmdb" => Ok(BackendKind::Kv),
            other => Err(format!("unknown metadata backend kind: {other}")),
        }
    }
}

/// Open the configured metadata backend under `data_dir`.
///
/// If `kind` is [`BackendKind::Kv`] and opening it fails, falls back to
/// the SQL backend rather than refusing to start — the KV store's map-size
/// and permission requirements are stricter than SQLite's, so a
/// misconfigured environment shouldn't take the whole cache down.
pub async fn open_meta_backend(
    kind: BackendKind,
    data_dir: &Path,
) -> Result<Arc<dyn MetaBackend>, MetaError> {
    match kind {
        BackendKind::Sql => {
            let backend = sql::SqlBackend::open(&data_dir.join("blobs.db")).await?;
            Ok(Arc::new(backend))
        }
        BackendKind::Kv => match kv::KvBackend::open(&data_dir.join("metadata.lmdb")).await {
            Ok(backend) => Ok(Arc::new(backend)),
            Err(e) => {
                warn!("failed to open KV metadata backend, falling back to SQL: {}", e);
                match sql::SqlBackend::open(&data_dir.join("blobs.db")).await {
                    Ok(backend) => Ok(Arc::new(backend)),
                    Err(e2) => {
                        error!("SQL metadata backend also failed to open: {}", e2);
                        Err(e2)
                    }
                }
            }
        },
    }
}
