use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};

use sitelens_core::analytics::{fetch_as, fetch_total};
use sitelens_core::reports::{EventRow, SessionRow, UserRow};
use sitelens_duckdb::queries::{
    lists::{event_count_plan, event_list_plan, EventListKind},
    sessions::{session_count_plan, session_list_plan},
    users::{user_count_plan, user_list_plan},
};

use crate::{auth::SiteContext, enrich::attach_traits, envelope::success, error::ApiError, state::AppState};

/// Rows and total count run as two concurrent queries; either failing fails
/// the request.
async fn event_list(
    state: &AppState,
    ctx: &SiteContext,
    kind: EventListKind<'_>,
    resource: &'static str,
) -> Result<impl IntoResponse, ApiError> {
    let scope = ctx.scope();
    let data = event_list_plan(&scope, kind, ctx.page());
    let count = event_count_plan(&scope, kind);
    let store = state.events.as_ref();

    let (rows, total) = tokio::try_join!(fetch_as::<EventRow>(store, &data), fetch_total(store, &count))
        .map_err(ApiError::storage(resource))?;
    Ok(success(rows, ctx.meta().paged(&ctx.params, total)))
}

/// `GET /api/v1/pageviews` - Paginated pageviews, newest first.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn pageviews(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    event_list(&state, &ctx, EventListKind::Pageviews, "pageviews").await
}

/// `GET /api/v1/events` - Paginated events, optionally narrowed by `eventName`.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    let kind = EventListKind::Events {
        event_name: ctx.params.event_name.as_deref(),
    };
    event_list(&state, &ctx, kind, "events").await
}

/// `GET /api/v1/sessions` - Paginated sessions with user traits attached.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    let scope = ctx.scope();
    let data = session_list_plan(&scope, ctx.page());
    let count = session_count_plan(&scope);
    let store = state.events.as_ref();

    let (mut rows, total) = tokio::try_join!(fetch_as::<SessionRow>(store, &data), fetch_total(store, &count))
        .map_err(ApiError::storage("sessions"))?;
    attach_traits(state.metadata.as_ref(), ctx.site_id(), &mut rows)
        .await
        .map_err(ApiError::storage("sessions"))?;
    Ok(success(rows, ctx.meta().paged(&ctx.params, total)))
}

/// `GET /api/v1/users` - Paginated users with traits attached.
#[tracing::instrument(skip_all, fields(site_id = ctx.site_id()))]
pub async fn users(
    State(state): State<Arc<AppState>>,
    ctx: SiteContext,
) -> Result<impl IntoResponse, ApiError> {
    let scope = ctx.scope();
    let data = user_list_plan(&scope, ctx.page());
    let count = user_count_plan(&scope);
    let store = state.events.as_ref();

    let (mut rows, total) = tokio::try_join!(fetch_as::<UserRow>(store, &data), fetch_total(store, &count))
        .map_err(ApiError::storage("users"))?;
    attach_traits(state.metadata.as_ref(), ctx.site_id(), &mut rows)
        .await
        .map_err(ApiError::storage("users"))?;
    Ok(success(rows, ctx.meta().paged(&ctx.params, total)))
}
