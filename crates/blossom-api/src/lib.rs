//! Blossom Cache HTTP surface
//!
//! Axum-based implementation of the Blossom blob protocol: health check,
//! status, upload, list, and blob get/head/delete, wrapped in permissive
//! CORS for browser clients.

pub mod descriptor;
pub mod error;
pub mod path_match;
pub mod pretty_json;
pub mod query;
pub mod range;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{HttpServer, ServerError};
pub use state::AppState;
