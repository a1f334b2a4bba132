use sitelens_core::filter::{Condition, FilterExpr, FilterField, FilterOp};
use sitelens_core::sql::QueryBuilder;

use super::BoundScope;

/// Compile a validated filter AST into a predicate over `events e`.
///
/// Field names and operators come from closed enums; every value is bound.
/// Session-level fields become a `session_id IN (...)` subquery that
/// aggregates the session's pageviews over the same site and window.
pub(crate) fn compile_filter(expr: &FilterExpr, q: &mut QueryBuilder, scope: &BoundScope) -> String {
    match expr {
        FilterExpr::Condition(c) => compile_condition(c, q, scope),
        FilterExpr::And(children) => join(children, " AND ", q, scope),
        FilterExpr::Or(children) => join(children, " OR ", q, scope),
    }
}

fn join(children: &[FilterExpr], sep: &str, q: &mut QueryBuilder, scope: &BoundScope) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| format!("({})", compile_filter(child, q, scope)))
        .collect();
    parts.join(sep)
}

fn compile_condition(c: &Condition, q: &mut QueryBuilder, scope: &BoundScope) -> String {
    let session_value = match c.field {
        FilterField::EntryPage => Some("arg_min(s.pathname, s.created_at)"),
        FilterField::ExitPage => Some("arg_max(s.pathname, s.created_at)"),
        _ => None,
    };
    match session_value {
        None => match_values(&format!("e.{}", c.field.as_str()), c, q),
        Some(aggregate) => format!(
            "e.session_id IN (SELECT s.session_id FROM events s WHERE {} AND s.event_type = 'pageview' \
             GROUP BY s.session_id HAVING {})",
            scope.base_predicate("s"),
            match_values(aggregate, c, q)
        ),
    }
}

/// `values` are OR'ed for positive operators; negated operators require
/// that none match. NULL never matches a positive operator.
fn match_values(column: &str, c: &Condition, q: &mut QueryBuilder) -> String {
    match c.op {
        FilterOp::Equals => {
            let list = q.bind_list(c.values.iter().map(String::as_str));
            format!("{column} IN {list}")
        }
        FilterOp::NotEquals => {
            let list = q.bind_list(c.values.iter().map(String::as_str));
            format!("({column} IS NULL OR {column} NOT IN {list})")
        }
        FilterOp::Contains => {
            let parts: Vec<String> = c
                .values
                .iter()
                .map(|v| format!("position({} in {column}) > 0", q.bind(v.as_str())))
                .collect();
            format!("({})", parts.join(" OR "))
        }
        FilterOp::NotContains => {
            let parts: Vec<String> = c
                .values
                .iter()
                .map(|v| format!("position({} in {column}) = 0", q.bind(v.as_str())))
                .collect();
            format!("({column} IS NULL OR ({}))", parts.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::january;
    use crate::queries::ReportScope;
    use sitelens_core::filter::parse_filters;
    use sitelens_core::sql::SqlValue;

    fn compile(raw: &str) -> (String, Vec<SqlValue>) {
        let window = january();
        let expr = parse_filters(raw).unwrap().unwrap();
        let scope = ReportScope {
            site_id: 1,
            window: &window,
            filter: Some(&expr),
        };
        let mut q = QueryBuilder::new();
        let bound = BoundScope::bind(&scope, &mut q);
        let plan = q.finish("t", bound.predicate(), Vec::new());
        (plan.sql, plan.params)
    }

    #[test]
    fn values_are_bound_never_inlined() {
        let (sql, params) = compile(r#"[{"parameter":"pathname","type":"equals","value":["/a'; DROP TABLE events; --"]}]"#);
        assert!(sql.ends_with("AND (e.pathname IN (?4))"));
        assert!(!sql.contains("DROP"));
        assert_eq!(params[3], SqlValue::Text("/a'; DROP TABLE events; --".into()));
    }

    #[test]
    fn negated_operators_keep_nulls() {
        let (sql, _) = compile(r#"[{"parameter":"browser","type":"not_contains","value":["Bot","Spider"]}]"#);
        assert!(sql.contains(
            "(e.browser IS NULL OR (position(?4 in e.browser) = 0 AND position(?5 in e.browser) = 0))"
        ));
    }

    #[test]
    fn combinators_are_parenthesised() {
        let (sql, params) = compile(
            r#"[{"or":[{"parameter":"country","type":"equals","value":["DE"]},{"parameter":"city","type":"contains","value":["Ber"]}]}]"#,
        );
        assert!(sql.contains("((e.country IN (?4)) OR ((position(?5 in e.city) > 0)))"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn session_fields_use_an_aggregating_subquery() {
        let (sql, _) = compile(r#"[{"parameter":"entry_page","type":"equals","value":["/landing"]}]"#);
        assert!(sql.contains("e.session_id IN (SELECT s.session_id FROM events s WHERE s.site_id = ?1"));
        assert!(sql.contains("HAVING arg_min(s.pathname, s.created_at) IN (?4)"));
    }
}
