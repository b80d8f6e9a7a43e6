//! `/status` (spec §4.5)

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::pretty_json::PrettyJson;
use crate::state::AppState;

#[derive(Serialize)]
struct StatusResponse {
    blob_count: u32,
    total_size_bytes: i64,
    total_size_mb: f64,
    status: &'static str,
}

async fn status(State(state): State<AppState>) -> PrettyJson<StatusResponse> {
    let blob_count = state.store.blob_count().await;
    let total_size_bytes = state.store.total_size().await;

    PrettyJson(StatusResponse {
        blob_count,
        total_size_bytes,
        total_size_mb: total_size_bytes as f64 / (1024.0 * 1024.0),
        status: "ok",
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status))
}
