use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};
use sitelens_core::window::BucketPlan;

use super::overview::{session_ctes, stats_columns};
use super::{BoundScope, ReportScope};

/// Overview metrics per bucket, one row per planned bucket even when a
/// bucket saw no traffic.
///
/// Bucket boundaries are computed in Rust (timezone-aware) and bound as a
/// single comma-separated parameter. Sessions are attributed to the bucket
/// holding their first event; pageviews and users to the bucket holding
/// each event. Both sides are LEFT JOINed onto the full boundary list.
pub fn bucketed_plan(scope: &ReportScope<'_>, buckets: &BucketPlan) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);
    let ctes = session_ctes(&bound.predicate());
    let boundaries = q.bind(buckets.encoded_boundaries());

    let sql = format!(
        r#"WITH {ctes},
        boundary_text AS (
            SELECT unnest(string_split(CAST({boundaries} AS VARCHAR), ',')) AS raw_boundary
        ),
        boundary_list AS (
            SELECT CAST(raw_boundary AS TIMESTAMP) AS boundary FROM boundary_text
        ),
        bucket_edges AS (
            SELECT boundary AS bucket_start, lead(boundary) OVER (ORDER BY boundary) AS bucket_end
            FROM boundary_list
        ),
        buckets AS (
            SELECT bucket_start, bucket_end FROM bucket_edges WHERE bucket_end IS NOT NULL
        ),
        session_buckets AS (
            SELECT
                b.bucket_start,
                COUNT(*) AS sessions,
                AVG(ss.pageviews) AS pages_per_session,
                CAST(SUM(CASE WHEN ss.pageviews = 1 THEN 1 ELSE 0 END) AS DOUBLE) / COUNT(*) AS bounce_rate,
                AVG(date_diff('second', ss.session_start, ss.session_end)) AS session_duration
            FROM session_stats ss
            JOIN buckets b ON ss.session_start >= b.bucket_start AND ss.session_start < b.bucket_end
            GROUP BY b.bucket_start
        ),
        event_buckets AS (
            SELECT
                b.bucket_start,
                COUNT(*) FILTER (WHERE sc.event_type = 'pageview') AS pageviews,
                COUNT(DISTINCT sc.user_id) AS users
            FROM scoped sc
            JOIN buckets b ON sc.created_at >= b.bucket_start AND sc.created_at < b.bucket_end
            GROUP BY b.bucket_start
        )
        SELECT
            CAST(b.bucket_start AS VARCHAR) AS "time",
            CAST(COALESCE(sb.sessions, 0) AS BIGINT) AS sessions,
            CAST(COALESCE(eb.pageviews, 0) AS BIGINT) AS pageviews,
            CAST(COALESCE(eb.users, 0) AS BIGINT) AS users,
            CAST(ROUND(COALESCE(sb.pages_per_session, 0), 2) AS DOUBLE) AS pages_per_session,
            CAST(ROUND(COALESCE(sb.bounce_rate, 0), 4) AS DOUBLE) AS bounce_rate,
            CAST(ROUND(COALESCE(sb.session_duration, 0), 2) AS DOUBLE) AS session_duration
        FROM buckets b
        LEFT JOIN session_buckets sb ON sb.bucket_start = b.bucket_start
        LEFT JOIN event_buckets eb ON eb.bucket_start = b.bucket_start
        ORDER BY b.bucket_start"#
    );

    let mut columns = vec![Column::new("time", ColumnKind::Timestamp)];
    columns.extend(stats_columns());
    q.finish("overview_bucketed", sql, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::january;
    use sitelens_core::params::Bucket;
    use sitelens_core::sql::SqlValue;

    #[test]
    fn boundaries_travel_as_one_bound_parameter() {
        let window = january();
        let buckets = BucketPlan::new(&window, Bucket::Week, 100).unwrap();
        let plan = bucketed_plan(
            &ReportScope {
                site_id: 1,
                window: &window,
                filter: None,
            },
            &buckets,
        );
        assert_eq!(plan.params.len(), 4);
        assert_eq!(plan.params[3], SqlValue::Text(buckets.encoded_boundaries()));
        assert!(plan.sql.contains("string_split(CAST(?4 AS VARCHAR), ',')"));
        assert!(plan.sql.contains("ORDER BY b.bucket_start"));
        assert_eq!(plan.columns[0], Column::new("time", ColumnKind::Timestamp));
    }
}
