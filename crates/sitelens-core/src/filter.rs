//! Caller-supplied report filters.
//!
//! The `filters` query parameter carries a JSON array of nodes (implicitly
//! AND'ed). A node is a condition
//! `{"parameter": "pathname", "type": "equals", "value": ["/a", "/b"]}`
//! whose values are OR'ed, or a combinator `{"and": [...]}` / `{"or": [...]}`.
//! Everything is validated into [`FilterExpr`] before any SQL is produced.

use serde::Deserialize;
use thiserror::Error;

use crate::error::ValidationError;

pub const MAX_DEPTH: usize = 4;
pub const MAX_CONDITIONS: usize = 32;
pub const MAX_VALUE_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filters must be a JSON array of conditions: {0}")]
    Malformed(String),
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("unknown filter operator '{0}'")]
    UnknownOperator(String),
    #[error("filter on '{0}' needs at least one value")]
    EmptyValues(String),
    #[error("filter value for '{0}' is too long")]
    ValueTooLong(String),
    #[error("filter groups must not be empty")]
    EmptyGroup,
    #[error("filters nest deeper than {} levels", MAX_DEPTH)]
    TooDeep,
    #[error("filters contain more than {} conditions", MAX_CONDITIONS)]
    TooManyConditions,
}

impl From<FilterError> for ValidationError {
    fn from(err: FilterError) -> Self {
        ValidationError::single("filters", err.to_string())
    }
}

/// Where a field's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    /// A column on each raw event row.
    Event,
    /// Only defined once a session's events are aggregated.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Hostname,
    Pathname,
    PageTitle,
    Querystring,
    Referrer,
    Browser,
    OperatingSystem,
    DeviceType,
    Country,
    Region,
    City,
    Language,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    EventName,
    EntryPage,
    ExitPage,
}

impl FilterField {
    pub const ALL: [FilterField; 18] = [
        FilterField::Hostname,
        FilterField::Pathname,
        FilterField::PageTitle,
        FilterField::Querystring,
        FilterField::Referrer,
        FilterField::Browser,
        FilterField::OperatingSystem,
        FilterField::DeviceType,
        FilterField::Country,
        FilterField::Region,
        FilterField::City,
        FilterField::Language,
        FilterField::UtmSource,
        FilterField::UtmMedium,
        FilterField::UtmCampaign,
        FilterField::EventName,
        FilterField::EntryPage,
        FilterField::ExitPage,
    ];

    /// Wire name, which for event-level fields is also the `events` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Hostname => "hostname",
            FilterField::Pathname => "pathname",
            FilterField::PageTitle => "page_title",
            FilterField::Querystring => "querystring",
            FilterField::Referrer => "referrer",
            FilterField::Browser => "browser",
            FilterField::OperatingSystem => "operating_system",
            FilterField::DeviceType => "device_type",
            FilterField::Country => "country",
            FilterField::Region => "region",
            FilterField::City => "city",
            FilterField::Language => "language",
            FilterField::UtmSource => "utm_source",
            FilterField::UtmMedium => "utm_medium",
            FilterField::UtmCampaign => "utm_campaign",
            FilterField::EventName => "event_name",
            FilterField::EntryPage => "entry_page",
            FilterField::ExitPage => "exit_page",
        }
    }

    pub fn scope(&self) -> FilterScope {
        match self {
            FilterField::EntryPage | FilterField::ExitPage => FilterScope::Session,
            _ => FilterScope::Event,
        }
    }

    fn parse(raw: &str) -> Result<Self, FilterError> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == raw)
            .ok_or_else(|| FilterError::UnknownField(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

impl FilterOp {
    fn parse(raw: &str) -> Result<Self, FilterError> {
        match raw {
            "equals" => Ok(FilterOp::Equals),
            "not_equals" => Ok(FilterOp::NotEquals),
            "contains" => Ok(FilterOp::Contains),
            "not_contains" => Ok(FilterOp::NotContains),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }

    /// Negated operators require the field to match none of the values.
    pub fn is_negated(&self) -> bool {
        matches!(self, FilterOp::NotEquals | FilterOp::NotContains)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: FilterField,
    pub op: FilterOp,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Condition(Condition),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn condition_count(&self) -> usize {
        match self {
            FilterExpr::Condition(_) => 1,
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                children.iter().map(FilterExpr::condition_count).sum()
            }
        }
    }

    pub fn uses_scope(&self, scope: FilterScope) -> bool {
        match self {
            FilterExpr::Condition(c) => c.field.scope() == scope,
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                children.iter().any(|c| c.uses_scope(scope))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    And {
        and: Vec<RawNode>,
    },
    Or {
        or: Vec<RawNode>,
    },
    Condition {
        parameter: String,
        #[serde(rename = "type")]
        op: String,
        value: RawValues,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValues {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFilters {
    List(Vec<RawNode>),
    Single(RawNode),
}

/// Parse and validate the serialized filter expression.
///
/// Returns `Ok(None)` for an empty list. Unknown fields or operators are
/// errors, never silently dropped.
pub fn parse_filters(raw: &str) -> Result<Option<FilterExpr>, FilterError> {
    let parsed: RawFilters =
        serde_json::from_str(raw).map_err(|e| FilterError::Malformed(e.to_string()))?;
    let nodes = match parsed {
        RawFilters::List(nodes) => nodes,
        RawFilters::Single(node) => vec![node],
    };
    if nodes.is_empty() {
        return Ok(None);
    }

    let mut expr = convert_group(nodes, 1)?;
    if let FilterExpr::And(children) = &mut expr {
        if children.len() == 1 {
            expr = children.remove(0);
        }
    }
    if expr.condition_count() > MAX_CONDITIONS {
        return Err(FilterError::TooManyConditions);
    }
    Ok(Some(expr))
}

fn convert_group(nodes: Vec<RawNode>, depth: usize) -> Result<FilterExpr, FilterError> {
    let children = convert_children(nodes, depth)?;
    Ok(FilterExpr::And(children))
}

fn convert_children(nodes: Vec<RawNode>, depth: usize) -> Result<Vec<FilterExpr>, FilterError> {
    if depth > MAX_DEPTH {
        return Err(FilterError::TooDeep);
    }
    if nodes.is_empty() {
        return Err(FilterError::EmptyGroup);
    }
    nodes.into_iter().map(|n| convert(n, depth)).collect()
}

fn convert(node: RawNode, depth: usize) -> Result<FilterExpr, FilterError> {
    match node {
        RawNode::And { and } => Ok(FilterExpr::And(convert_children(and, depth + 1)?)),
        RawNode::Or { or } => Ok(FilterExpr::Or(convert_children(or, depth + 1)?)),
        RawNode::Condition {
            parameter,
            op,
            value,
        } => {
            let field = FilterField::parse(&parameter)?;
            let op = FilterOp::parse(&op)?;
            let values = match value {
                RawValues::Many(v) => v,
                RawValues::One(v) => vec![v],
            };
            if values.is_empty() {
                return Err(FilterError::EmptyValues(parameter));
            }
            if values.iter().any(|v| v.len() > MAX_VALUE_LEN) {
                return Err(FilterError::ValueTooLong(parameter));
            }
            Ok(FilterExpr::Condition(Condition { field, op, values }))
        }
    }
}
