use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};

use sitelens_core::analytics::fetch_as;
use sitelens_core::reports::{BucketStats, OverviewStats};
use sitelens_core::window::BucketPlan;
use sitelens_duckdb::queries::{overview::overview_plan, timeseries::bucketed_plan};

use crate::{auth::SiteContext, envelope::success, error::ApiError, state::AppState};

/// `GET /api/v1/overview` - Totals for the window.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn overview(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    let rows: Vec<OverviewStats> = fetch_as(state.events.as_ref(), &overview_plan(&ctx.scope()))
        .await
        .map_err(ApiError::storage("overview"))?;
    let stats = rows.into_iter().next().unwrap_or_default();
    Ok(success(stats, ctx.meta()))
}

/// `GET /api/v1/overview/bucketed` - Overview metrics per time bucket,
/// one row per bucket including empty ones.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn overview_bucketed(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = ctx.params.require_bucket()?;
    let buckets = BucketPlan::new(&ctx.window, bucket, state.config.max_buckets)?;
    let rows: Vec<BucketStats> = fetch_as(state.events.as_ref(), &bucketed_plan(&ctx.scope(), &buckets))
        .await
        .map_err(ApiError::storage("overview"))?;
    Ok(success(rows, ctx.meta()))
}
