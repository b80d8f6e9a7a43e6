//! `GET /list/<anything>` (spec §4.5)
//!
//! The path segment after `/list/` is accepted but ignored — Blossom's
//! list endpoint is conventionally namespaced by pubkey in the wider
//! protocol, but this cache has no notion of per-user ownership, so every
//! request lists the same global set.

use axum::extract::{Path, RawQuery, State};
use axum::routing::get;
use axum::Router;

use crate::descriptor::BlobDescriptor;
use crate::error::ApiError;
use crate::pretty_json::PrettyJson;
use crate::query::single_value;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

async fn list(
    State(state): State<AppState>,
    Path(_who): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<PrettyJson<Vec<BlobDescriptor>>, ApiError> {
    let cursor = single_value(query.as_deref(), "cursor");
    let limit = single_value(query.as_deref(), "limit")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&n| n != 0)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let blobs = state
        .store
        .list_blobs(cursor.as_deref(), limit)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let descriptors = blobs
        .iter()
        .map(|meta| BlobDescriptor::from_meta(meta, &state.base_url))
        .collect();

    Ok(PrettyJson(descriptors))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/list/{who}", get(list))
}
