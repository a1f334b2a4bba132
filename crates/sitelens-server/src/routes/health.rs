use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// Unauthenticated probe polled by `sitelens health` and container checks.
///
/// Pings the event store. A failed ping is logged and reported as
/// `503 {"status":"degraded"}`; the underlying error never reaches the body.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (code, status) = match state.events.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "event store ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    (
        code,
        Json(json!({ "status": status, "version": env!("CARGO_PKG_VERSION") })),
    )
}
