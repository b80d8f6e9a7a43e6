//! Upstream fetch error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("blob not found on any upstream server")]
    NotFound,

    #[error("all upstream servers failed: {0}")]
    AllFailed(String),
}
