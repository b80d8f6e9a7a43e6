//! `GET|HEAD /<h>[.ext]` and `DELETE /<h>` (spec §4.5)

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::Router;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::path_match::parse_blob_segment;
use crate::pretty_json::PrettyJson;
use crate::query::all_values;
use crate::range::parse_range;
use crate::state::AppState;

async fn get_blob(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(query): RawQuery,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let Some(sha256) = parse_blob_segment(&segment) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let hints = all_values(query.as_deref(), "xs");
    let (data, info) = state.cache.get(sha256, &hints).await?;

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let total_len = data.len() as u64;

    let mut response = match parse_range(range_header, total_len) {
        None => {
            let mut response = (StatusCode::OK, data).into_response();
            response.headers_mut().insert(
                header::CONTENT_LENGTH,
                HeaderValue::from_str(&total_len.to_string()).unwrap(),
            );
            response.headers_mut().insert(
                "X-Blob-SHA256",
                HeaderValue::from_str(sha256).unwrap(),
            );
            response
        }
        Some(Err(())) => {
            return Err(ApiError::RangeUnsatisfiable { total: info.size });
        }
        Some(Ok(range)) => {
            let slice = data.slice(range.start as usize..=range.end as usize);
            let content_range = format!("bytes {}-{}/{}", range.start, range.end, total_len);
            let mut response = (StatusCode::PARTIAL_CONTENT, slice).into_response();
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&content_range).unwrap(),
            );
            response.headers_mut().insert(
                header::CONTENT_LENGTH,
                HeaderValue::from_str(&(range.end - range.start + 1).to_string()).unwrap(),
            );
            response
        }
    };

    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&info.mime_type).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok(response)
}

async fn head_blob(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let Some(sha256) = parse_blob_segment(&segment) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let info = match state.store.get_info(sha256).await {
        Ok(info) => info,
        Err(_) => return Ok(StatusCode::NOT_FOUND.into_response()),
    };

    let mut response = (StatusCode::OK, Body::empty()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&info.mime_type).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response.headers_mut().insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&info.size.to_string()).unwrap(),
    );
    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    Ok(response)
}

async fn delete_blob(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let Some(sha256) = parse_blob_segment(&segment) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    if !state.store.contains(sha256).await {
        return Err(ApiError::NotFound("blob not found".to_string()));
    }

    state.store.delete(sha256).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    debug!("deleted {}", sha256);

    Ok((
        StatusCode::OK,
        PrettyJson(json!({ "message": "blob deleted", "sha256": sha256 })),
    )
        .into_response())
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/{segment}",
        get(get_blob).head(head_blob).delete(delete_blob),
    )
}
