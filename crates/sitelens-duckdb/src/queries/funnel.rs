use sitelens_core::analytics::Row;
use sitelens_core::funnel::{FunnelDefinition, FunnelStep, StepKind};
use sitelens_core::sql::{Column, ColumnKind, QueryBuilder, QueryPlan};

use super::{BoundScope, ReportScope};

fn step_condition_sql(step: &FunnelStep, q: &mut QueryBuilder) -> String {
    let mut condition = match step.kind {
        StepKind::Page => format!("e.event_type = 'pageview' AND e.pathname = {}", q.bind(step.value.as_str())),
        StepKind::Event => format!(
            "e.event_type = 'custom_event' AND e.event_name = {}",
            q.bind(step.value.as_str())
        ),
    };
    if let Some(hostname) = &step.hostname {
        condition.push_str(&format!(" AND e.hostname = {}", q.bind(hostname.as_str())));
    }
    condition
}

/// Distinct sessions reaching each step in order.
///
/// `step_1` holds each session's earliest match of the first step. Every
/// later `step_n` keeps only sessions from `step_{n-1}` with a match strictly
/// after that session's previous match, again taking the earliest. Because
/// only the minimum timestamp is carried forward and the comparison is `>`,
/// the result does not depend on row order when timestamps tie.
///
/// Returns a single row with one integer column per step: `step_1`, `step_2`, ...
pub fn funnel_plan(scope: &ReportScope<'_>, funnel: &FunnelDefinition) -> QueryPlan {
    let mut q = QueryBuilder::new();
    let bound = BoundScope::bind(scope, &mut q);

    let mut ctes = Vec::new();
    ctes.push(format!(
        r#"
        scoped_events AS (
            SELECT
                e.session_id,
                e.created_at,
                e.event_type,
                e.pathname,
                e.event_name,
                e.hostname
            FROM events e
            WHERE {}
        )
        "#,
        bound.predicate()
    ));

    for (idx, step) in funnel.steps().iter().enumerate() {
        let step_num = idx + 1;
        let prev_step_num = idx;
        let condition = step_condition_sql(step, &mut q);

        let cte = if step_num == 1 {
            format!(
                r#"
                step_{step_num} AS (
                    SELECT e.session_id, MIN(e.created_at) AS matched_at
                    FROM scoped_events e
                    WHERE {condition}
                    GROUP BY e.session_id
                )
                "#
            )
        } else {
            format!(
                r#"
                step_{step_num} AS (
                    SELECT e.session_id, MIN(e.created_at) AS matched_at
                    FROM scoped_events e
                    JOIN step_{prev_step_num} prev ON prev.session_id = e.session_id
                    WHERE e.created_at > prev.matched_at
                      AND {condition}
                    GROUP BY e.session_id
                )
                "#
            )
        };
        ctes.push(cte);
    }

    let count_columns: Vec<String> = (1..=funnel.steps().len())
        .map(|i| format!("CAST((SELECT COUNT(*) FROM step_{i}) AS BIGINT) AS step_{i}"))
        .collect();
    let sql = format!("WITH {}\nSELECT {}", ctes.join(","), count_columns.join(", "));
    let columns = (1..=funnel.steps().len())
        .map(|i| Column::new(format!("step_{i}"), ColumnKind::Int))
        .collect();

    q.finish("funnel", sql, columns)
}

/// Read the per-step counts out of the single row [`funnel_plan`] returns.
pub fn step_counts(rows: &[Row], steps: usize) -> Vec<i64> {
    let row = rows.first();
    (1..=steps)
        .map(|i| {
            row.and_then(|r| r.get(&format!("step_{i}")))
                .and_then(|v| v.as_i64())
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::january;
    use serde_json::json;
    use sitelens_core::sql::SqlValue;

    fn step(value: &str, kind: StepKind, hostname: Option<&str>) -> FunnelStep {
        FunnelStep {
            value: value.into(),
            name: None,
            kind,
            hostname: hostname.map(str::to_string),
        }
    }

    #[test]
    fn each_step_joins_the_previous_one_strictly_later() {
        let window = january();
        let funnel = FunnelDefinition::new(vec![
            step("/pricing", StepKind::Page, Some("example.com")),
            step("signup", StepKind::Event, None),
            step("/welcome", StepKind::Page, None),
        ])
        .unwrap();
        let plan = funnel_plan(
            &ReportScope {
                site_id: 1,
                window: &window,
                filter: None,
            },
            &funnel,
        );

        assert!(plan.sql.contains("e.event_type = 'pageview' AND e.pathname = ?4 AND e.hostname = ?5"));
        assert!(plan.sql.contains("e.event_type = 'custom_event' AND e.event_name = ?6"));
        assert!(plan.sql.contains("JOIN step_2 prev ON prev.session_id = e.session_id"));
        assert!(plan.sql.contains("WHERE e.created_at > prev.matched_at"));
        assert!(plan.sql.contains("AS step_3"));
        assert_eq!(
            plan.params[3..],
            [
                SqlValue::Text("/pricing".into()),
                SqlValue::Text("example.com".into()),
                SqlValue::Text("signup".into()),
                SqlValue::Text("/welcome".into()),
            ]
        );
        assert_eq!(plan.columns.len(), 3);
    }

    #[test]
    fn step_counts_default_to_zero() {
        let row = match json!({"step_1": 5, "step_2": 2}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert_eq!(step_counts(&[row], 3), vec![5, 2, 0]);
        assert_eq!(step_counts(&[], 2), vec![0, 0]);
    }
}
