//! API routes

mod blob;
mod health;
mod list;
mod status;
mod upload;

use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

/// Blossom clients are run from arbitrary origins (web, mobile, CLI), so
/// every route is opened up the same way regardless of caller (spec §4.5).
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86400))
}

/// `tower_http::cors::CorsLayer` answers preflight with `200` and mirrors
/// back the requested `Access-Control-Request-Headers` rather than the
/// literal `204` + `Authorization, *` spec §4.5 requires, so OPTIONS is
/// intercepted ahead of it and answered directly.
async fn cors_preflight(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, HEAD, PUT, DELETE, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Authorization, *"),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
        return response;
    }
    next.run(req).await
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(status::routes())
        .merge(upload::routes())
        .merge(list::routes())
        .merge(blob::routes())
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::SERVER,
            HeaderValue::from_static("blossom-cache/1.0"),
        ))
        .layer(middleware::from_fn(cors_preflight))
        .with_state(state)
}
