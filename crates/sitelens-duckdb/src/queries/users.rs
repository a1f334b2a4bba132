use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};

use super::{BoundScope, Page, ReportScope};

/// One row per user seen in the window, ordered by last activity.
/// Device and location dimensions reflect the user's latest event.
pub fn user_list_plan(scope: &ReportScope<'_>, page: Page) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let sql = format!(
        r#"WITH scoped AS (
            SELECT e.*
            FROM events e
            WHERE {}
        ),
        user_rollup AS (
            SELECT
                user_id,
                COUNT(DISTINCT session_id) AS sessions,
                COUNT(*) FILTER (WHERE event_type = 'pageview') AS pageviews,
                COUNT(*) AS events,
                MIN(created_at) AS first_seen,
                MAX(created_at) AS last_seen,
                arg_max(browser, created_at) AS browser,
                arg_max(operating_system, created_at) AS operating_system,
                arg_max(device_type, created_at) AS device_type,
                arg_max(country, created_at) AS country
            FROM scoped
            GROUP BY user_id
        )
        SELECT
            user_id,
            CAST(sessions AS BIGINT) AS sessions,
            CAST(pageviews AS BIGINT) AS pageviews,
            CAST(events AS BIGINT) AS events,
            CAST(first_seen AS VARCHAR) AS first_seen,
            CAST(last_seen AS VARCHAR) AS last_seen,
            browser,
            operating_system,
            device_type,
            country
        FROM user_rollup
        ORDER BY last_seen DESC, user_id DESC
        {}"#,
        bound.predicate(),
        page.sql()
    );

    let text = |name: &str| Column::new(name, ColumnKind::Text);
    let columns = vec![
        text("user_id"),
        Column::new("sessions", ColumnKind::Int),
        Column::new("pageviews", ColumnKind::Int),
        Column::new("events", ColumnKind::Int),
        Column::new("first_seen", ColumnKind::Timestamp),
        Column::new("last_seen", ColumnKind::Timestamp),
        text("browser"),
        text("operating_system"),
        text("device_type"),
        text("country"),
    ];
    q.finish("users", sql, columns)
}

pub fn user_count_plan(scope: &ReportScope<'_>) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let sql = format!(
        "SELECT CAST(COUNT(DISTINCT e.user_id) AS BIGINT) AS total FROM events e WHERE {}",
        bound.predicate()
    );
    q.finish("users_count", sql, vec![Column::new("total", ColumnKind::Int)])
}
