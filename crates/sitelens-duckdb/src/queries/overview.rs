use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};

use super::{BoundScope, ReportScope};

/// The two CTEs every traffic summary starts from: the filtered events, and
/// one row per session with its pageview count and first/last timestamps.
pub(crate) fn session_ctes(predicate: &str) -> String {
    format!(
        r#"scoped AS (
            SELECT e.session_id, e.user_id, e.event_type, e.created_at
            FROM events e
            WHERE {predicate}
        ),
        session_stats AS (
            SELECT
                session_id,
                COUNT(*) FILTER (WHERE event_type = 'pageview') AS pageviews,
                MIN(created_at) AS session_start,
                MAX(created_at) AS session_end
            FROM scoped
            GROUP BY session_id
        )"#
    )
}

/// Output columns shared by the overview and each series bucket.
pub(crate) fn stats_columns() -> Vec<Column> {
    vec![
        Column::new("sessions", ColumnKind::Int),
        Column::new("pageviews", ColumnKind::Int),
        Column::new("users", ColumnKind::Int),
        Column::new("pages_per_session", ColumnKind::Float),
        Column::new("bounce_rate", ColumnKind::Float),
        Column::new("session_duration", ColumnKind::Float),
    ]
}

/// Single-row totals: session-level stats joined with event-level counts.
///
/// Bounce rate is the fraction of sessions with exactly one pageview;
/// session duration is the mean of `last event - first event` in seconds.
pub fn overview_plan(scope: &ReportScope<'_>) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let ctes = session_ctes(&bound.predicate());

    let sql = format!(
        r#"WITH {ctes},
        session_agg AS (
            SELECT
                COUNT(*) AS sessions,
                AVG(pageviews) AS pages_per_session,
                CAST(SUM(CASE WHEN pageviews = 1 THEN 1 ELSE 0 END) AS DOUBLE) / NULLIF(COUNT(*), 0) AS bounce_rate,
                AVG(date_diff('second', session_start, session_end)) AS session_duration
            FROM session_stats
        ),
        event_agg AS (
            SELECT
                COUNT(*) FILTER (WHERE event_type = 'pageview') AS pageviews,
                COUNT(DISTINCT user_id) AS users
            FROM scoped
        )
        SELECT
            CAST(s.sessions AS BIGINT) AS sessions,
            CAST(ev.pageviews AS BIGINT) AS pageviews,
            CAST(ev.users AS BIGINT) AS users,
            CAST(ROUND(COALESCE(s.pages_per_session, 0), 2) AS DOUBLE) AS pages_per_session,
            CAST(ROUND(COALESCE(s.bounce_rate, 0), 4) AS DOUBLE) AS bounce_rate,
            CAST(ROUND(COALESCE(s.session_duration, 0), 2) AS DOUBLE) AS session_duration
        FROM session_agg s
        CROSS JOIN event_agg ev"#
    );

    q.finish("overview", sql, stats_columns())
}
