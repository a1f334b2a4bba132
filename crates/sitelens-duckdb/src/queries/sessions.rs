use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};

use super::{BoundScope, Page, ReportScope};

/// One row per session seen in the window, most recently active first.
///
/// Entry and exit pages are the first and last pageview paths; device and
/// location dimensions come from the session's first event.
pub fn session_list_plan(scope: &ReportScope<'_>, page: Page) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let sql = format!(
        r#"WITH scoped AS (
            SELECT e.*
            FROM events e
            WHERE {}
        ),
        session_rollup AS (
            SELECT
                session_id,
                arg_min(user_id, created_at) AS user_id,
                MIN(created_at) AS session_start,
                MAX(created_at) AS session_end,
                COUNT(*) FILTER (WHERE event_type = 'pageview') AS pageviews,
                COUNT(*) AS events,
                arg_min(pathname, created_at) FILTER (WHERE event_type = 'pageview') AS entry_page,
                arg_max(pathname, created_at) FILTER (WHERE event_type = 'pageview') AS exit_page,
                arg_min(hostname, created_at) AS hostname,
                arg_min(browser, created_at) AS browser,
                arg_min(operating_system, created_at) AS operating_system,
                arg_min(device_type, created_at) AS device_type,
                arg_min(country, created_at) AS country,
                arg_min(region, created_at) AS region,
                arg_min(city, created_at) AS city
            FROM scoped
            GROUP BY session_id
        )
        SELECT
            session_id,
            user_id,
            CAST(session_start AS VARCHAR) AS session_start,
            CAST(session_end AS VARCHAR) AS session_end,
            CAST(date_diff('second', session_start, session_end) AS BIGINT) AS session_duration,
            CAST(pageviews AS BIGINT) AS pageviews,
            CAST(events AS BIGINT) AS events,
            entry_page,
            exit_page,
            hostname,
            browser,
            operating_system,
            device_type,
            country,
            region,
            city
        FROM session_rollup
        ORDER BY session_end DESC, session_id DESC
        {}"#,
        bound.predicate(),
        page.sql()
    );

    let text = |name: &str| Column::new(name, ColumnKind::Text);
    let columns = vec![
        text("session_id"),
        text("user_id"),
        Column::new("session_start", ColumnKind::Timestamp),
        Column::new("session_end", ColumnKind::Timestamp),
        Column::new("session_duration", ColumnKind::Int),
        Column::new("pageviews", ColumnKind::Int),
        Column::new("events", ColumnKind::Int),
        text("entry_page"),
        text("exit_page"),
        text("hostname"),
        text("browser"),
        text("operating_system"),
        text("device_type"),
        text("country"),
        text("region"),
        text("city"),
    ];
    q.finish("sessions", sql, columns)
}

pub fn session_count_plan(scope: &ReportScope<'_>) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let sql = format!(
        "SELECT CAST(COUNT(DISTINCT e.session_id) AS BIGINT) AS total FROM events e WHERE {}",
        bound.predicate()
    );
    q.finish("sessions_count", sql, vec![Column::new("total", ColumnKind::Int)])
}
