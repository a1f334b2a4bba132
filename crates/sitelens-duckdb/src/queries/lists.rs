use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};

use super::{BoundScope, Page, ReportScope};

/// Which raw events a list report returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventListKind<'a> {
    Pageviews,
    /// All events, optionally only custom events with this exact name.
    Events { event_name: Option<&'a str> },
}

const EVENT_COLUMNS: &str = r#"CAST(e.created_at AS VARCHAR) AS "timestamp",
            e.event_type,
            e.event_name,
            e.session_id,
            e.user_id,
            e.hostname,
            e.pathname,
            e.querystring,
            e.page_title,
            e.referrer,
            e.browser,
            e.operating_system,
            e.device_type,
            e.country,
            e.props"#;

fn event_row_columns() -> Vec<Column> {
    let text = |name: &str| Column::new(name, ColumnKind::Text);
    vec![
        Column::new("timestamp", ColumnKind::Timestamp),
        text("event_type"),
        text("event_name"),
        text("session_id"),
        text("user_id"),
        text("hostname"),
        text("pathname"),
        text("querystring"),
        text("page_title"),
        text("referrer"),
        text("browser"),
        text("operating_system"),
        text("device_type"),
        text("country"),
        Column::new("props", ColumnKind::Json),
    ]
}

fn kind_predicate(kind: EventListKind<'_>, q: &mut QueryBuilder) -> String {
    match kind {
        EventListKind::Pageviews => " AND e.event_type = 'pageview'".to_string(),
        EventListKind::Events { event_name: None } => String::new(),
        EventListKind::Events {
            event_name: Some(name),
        } => format!(" AND e.event_name = {}", q.bind(name)),
    }
}

/// Most recent events first; ties broken by id so pages never overlap.
pub fn event_list_plan(scope: &ReportScope<'_>, kind: EventListKind<'_>, page: Page) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let kind_sql = kind_predicate(kind, &mut q);
    let sql = format!(
        r#"SELECT
            {EVENT_COLUMNS}
        FROM events e
        WHERE {}{kind_sql}
        ORDER BY e.created_at DESC, e.id DESC
        {}"#,
        bound.predicate(),
        page.sql()
    );
    let label = match kind {
        EventListKind::Pageviews => "pageviews",
        EventListKind::Events { .. } => "events",
    };
    q.finish(label, sql, event_row_columns())
}

/// Total rows [`event_list_plan`] would return across all pages.
pub fn event_count_plan(scope: &ReportScope<'_>, kind: EventListKind<'_>) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let kind_sql = kind_predicate(kind, &mut q);
    let sql = format!(
        "SELECT CAST(COUNT(*) AS BIGINT) AS total FROM events e WHERE {}{kind_sql}",
        bound.predicate()
    );
    let label = match kind {
        EventListKind::Pageviews => "pageviews_count",
        EventListKind::Events { .. } => "events_count",
    };
    q.finish(label, sql, vec![Column::new("total", ColumnKind::Int)])
}
