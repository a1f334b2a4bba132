//! DuckDB query constructors.
//!
//! Every constructor is a pure function from report inputs to a
//! [`QueryPlan`]; nothing here touches a connection. Execution goes through
//! [`sitelens_core::analytics::EventStore`].

pub mod filters;
pub mod funnel;
pub mod lists;
pub mod overview;
pub mod sessions;
pub mod timeseries;
pub mod users;

use sitelens_core::filter::FilterExpr;
use sitelens_core::sql::QueryBuilder;
use sitelens_core::window::{BoundWindow, TimeWindow};

/// Inputs shared by every report: which site, which window, which filter.
#[derive(Debug, Clone, Copy)]
pub struct ReportScope<'a> {
    pub site_id: i64,
    pub window: &'a TimeWindow,
    pub filter: Option<&'a FilterExpr>,
}

/// One page of a list report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

impl Page {
    /// Both values are validated integers, so they are inlined rather than bound.
    pub(crate) fn sql(&self) -> String {
        format!("LIMIT {} OFFSET {}", self.limit, self.offset)
    }
}

/// A [`ReportScope`] whose site, window bounds and filter values are
/// already bound into a [`QueryBuilder`].
pub(crate) struct BoundScope {
    site: String,
    window: BoundWindow,
    filter: Option<String>,
}

impl BoundScope {
    pub(crate) fn bind(scope: &ReportScope<'_>, q: &mut QueryBuilder) -> Self {
        let site = q.bind(scope.site_id);
        let window = scope.window.bind(q);
        let mut bound = Self {
            site,
            window,
            filter: None,
        };
        bound.filter = scope
            .filter
            .map(|expr| filters::compile_filter(expr, q, &bound));
        bound
    }

    /// Site + window + caller filter over the `events` table aliased `e`.
    pub(crate) fn predicate(&self) -> String {
        let mut sql = self.base_predicate("e");
        if let Some(filter) = &self.filter {
            sql.push_str(" AND (");
            sql.push_str(filter);
            sql.push(')');
        }
        sql
    }

    /// Site + window only, over the `events` table aliased `alias`.
    pub(crate) fn base_predicate(&self, alias: &str) -> String {
        format!(
            "{alias}.site_id = {} AND {}",
            self.site,
            self.window.predicate(&format!("{alias}.created_at"))
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use sitelens_core::window::TimeWindow;

    pub fn january() -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            chrono_tz::Tz::UTC,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitelens_core::filter::parse_filters;

    #[test]
    fn predicate_binds_site_then_window_then_filter_values() {
        let window = test_support::january();
        let filter = parse_filters(r#"[{"parameter":"country","type":"equals","value":["NZ"]}]"#)
            .unwrap()
            .unwrap();
        let scope = ReportScope {
            site_id: 9,
            window: &window,
            filter: Some(&filter),
        };
        let mut q = QueryBuilder::new();
        let bound = BoundScope::bind(&scope, &mut q);
        assert_eq!(
            bound.predicate(),
            "e.site_id = ?1 AND e.created_at >= CAST(?2 AS TIMESTAMP) AND e.created_at < CAST(?3 AS TIMESTAMP) \
             AND (e.country IN (?4))"
        );
        assert_eq!(q.param_count(), 4);
    }

    #[test]
    fn page_inlines_validated_numbers() {
        assert_eq!(Page { limit: 25, offset: 50 }.sql(), "LIMIT 25 OFFSET 50");
    }
}
