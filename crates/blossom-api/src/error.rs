//! HTTP-layer error mapping (spec §4.5, §7)
//!
//! Every error response carries `X-Reason: <message>` and a JSON body
//! `{"error": <message>}`, per spec §4.5. CORS headers are added by the
//! router's [`tower_http::cors::CorsLayer`], not here.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::pretty_json::PrettyJson;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("range not satisfiable")]
    RangeUnsatisfiable { total: i64 },

    #[error("upstream fetch failed: {0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl From<blossom_core::CoreError> for ApiError {
    fn from(e: blossom_core::CoreError) -> Self {
        match e {
            blossom_core::CoreError::NotFound => ApiError::NotFound("blob not found".to_string()),
            blossom_core::CoreError::TooLarge => ApiError::TooLarge("blob too large".to_string()),
            blossom_core::CoreError::Upstream(u) => ApiError::BadGateway(u.to_string()),
            blossom_core::CoreError::Store(s) => ApiError::Internal(s.to_string()),
            blossom_core::CoreError::EvictionFailed => {
                ApiError::Internal("eviction candidate lookup failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::TooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ApiError::RangeUnsatisfiable { total } => {
                (StatusCode::RANGE_NOT_SATISFIABLE, format!("range not satisfiable, total {total}"))
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let mut response = (status, PrettyJson(json!({ "error": message }))).into_response();

        if let ApiError::RangeUnsatisfiable { total } = &self {
            response.headers_mut().insert(
                "Content-Range",
                HeaderValue::from_str(&format!("bytes */{total}")).unwrap(),
            );
        }
        if let Ok(value) = HeaderValue::from_str(&message) {
            response.headers_mut().insert("X-Reason", value);
        }

        response
    }
}
