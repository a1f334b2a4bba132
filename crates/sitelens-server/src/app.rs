use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{envelope::failure, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer`: structured request/response logging via `tracing`.
/// 2. `CorsLayer`: any origin when `SITELENS_CORS_ORIGINS` is empty,
///    otherwise only the listed origins (with credentials, so the session
///    cookie is sent).
/// 3. `CompressionLayer`: gzip for list payloads.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        .route("/overview", get(routes::overview::overview))
        .route("/overview/bucketed", get(routes::overview::overview_bucketed))
        .route("/pageviews", get(routes::lists::pageviews))
        .route("/events", get(routes::lists::events))
        .route("/sessions", get(routes::lists::sessions))
        .route("/users", get(routes::lists::users))
        .route("/funnel", post(routes::funnel::funnel));

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed).allow_credentials(true)
}

async fn not_found() -> impl IntoResponse {
    failure(StatusCode::NOT_FOUND, "Not found")
}
