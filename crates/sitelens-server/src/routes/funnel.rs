use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};

use sitelens_core::funnel::{compute_funnel_results, FunnelDefinition, FunnelRequest};
use sitelens_duckdb::queries::funnel::{funnel_plan, step_counts};

use crate::{auth::SiteContext, envelope::success, error::ApiError, state::AppState};

/// `POST /api/v1/funnel` - Ordered conversion through the steps in the body.
///
/// Site, window and filters come from the query string like every other
/// report.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn funnel(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
    body: Result<Json<FunnelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let definition = FunnelDefinition::new(request.steps)?;

    let rows = state
        .events
        .fetch(&funnel_plan(&ctx.scope(), &definition))
        .await
        .map_err(ApiError::storage("funnel"))?;
    let counts = step_counts(&rows, definition.steps().len());
    Ok(success(compute_funnel_results(&definition, &counts), ctx.meta()))
}
