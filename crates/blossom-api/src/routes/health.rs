//! `/` health check (spec §4.5)

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::state::AppState;

async fn health() -> impl IntoResponse {
    ""
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(health).head(health))
}
