//! `PUT /upload` (spec §4.5)

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::put;
use axum::Router;
use bytes::Bytes;

use blossom_core::CoreError;
use blossom_store::path::compute_sha256;

use crate::descriptor::BlobDescriptor;
use crate::error::ApiError;
use crate::pretty_json::PrettyJson;
use crate::state::AppState;

async fn upload(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload body".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let sha256 = compute_sha256(&body);

    let info = match state.cache.put(&sha256, body, content_type).await {
        Ok(info) => info,
        Err(CoreError::TooLarge) => return Err(ApiError::TooLarge("blob too large".to_string())),
        Err(e) => return Err(e.into()),
    };

    Ok(PrettyJson(BlobDescriptor::from_meta(&info, &state.base_url)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/upload", put(upload))
}
