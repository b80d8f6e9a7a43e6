//! Content-addressed blob storage for Blossom Cache.
//!
//! Layers a sharded filesystem layout over a [`blossom_meta::MetaBackend`]:
//! see [`store::BlobStore`] for the combined contract.

pub mod error;
pub mod path;
pub mod store;

pub use error::StoreError;
pub use store::BlobStore;
