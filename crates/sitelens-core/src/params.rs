//! Query-string normalisation shared by every public analytics endpoint.

use std::fmt;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;
pub const DEFAULT_PAGE: u32 = 1;
/// `from` defaults to this many days before today.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Raw query-string values exactly as the caller sent them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParams {
    pub site_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub timezone: Option<String>,
    pub bucket: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub event_name: Option<String>,
    pub filters: Option<String>,
}

/// Time-series granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Minute,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Bucket {
    pub const ALL: [Bucket; 9] = [
        Bucket::Minute,
        Bucket::FiveMinutes,
        Bucket::TenMinutes,
        Bucket::FifteenMinutes,
        Bucket::Hour,
        Bucket::Day,
        Bucket::Week,
        Bucket::Month,
        Bucket::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Minute => "minute",
            Bucket::FiveMinutes => "five_minutes",
            Bucket::TenMinutes => "ten_minutes",
            Bucket::FifteenMinutes => "fifteen_minutes",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Year => "year",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == raw)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable view of one request's query parameters.
///
/// `site_id` is still the caller's raw value here; resolving it to a numeric
/// site happens in the access guard.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub site_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timezone: Tz,
    pub bucket: Option<Bucket>,
    pub limit: u32,
    pub page: u32,
    pub event_name: Option<String>,
    pub filters: Option<String>,
}

impl RequestDescriptor {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Series endpoints call this; the normalizer itself leaves `bucket` optional.
    pub fn require_bucket(&self) -> Result<Bucket, ValidationError> {
        self.bucket
            .ok_or_else(|| ValidationError::single("bucket", "bucket is required"))
    }

    pub fn from_label(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    pub fn to_label(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }
}

/// Validate raw query values into a [`RequestDescriptor`].
///
/// Every field is checked even after an earlier failure so the caller sees
/// all problems at once. `today` is the current UTC date, passed in so the
/// default window is testable.
pub fn normalize(raw: &RawParams, today: NaiveDate) -> Result<RequestDescriptor, ValidationError> {
    let mut errors = ValidationError::new();

    let site_id = match raw.site_id.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            errors.push("siteId", "siteId is required");
            String::new()
        }
    };

    let start_date = parse_date(raw.from.as_deref(), "from", &mut errors)
        .unwrap_or(today - Duration::days(DEFAULT_LOOKBACK_DAYS));
    let end_date = parse_date(raw.to.as_deref(), "to", &mut errors).unwrap_or(today);
    if start_date > end_date && !errors.has_field("from") && !errors.has_field("to") {
        errors.push("to", "to must be on or after from");
    }

    let timezone = match raw.timezone.as_deref() {
        None | Some("") => Tz::UTC,
        Some(name) => Tz::from_str_insensitive(name).unwrap_or_else(|_| {
            errors.push("timezone", "Invalid timezone");
            Tz::UTC
        }),
    };

    let bucket = match raw.bucket.as_deref() {
        None => None,
        Some(v) => {
            let parsed = Bucket::parse(v);
            if parsed.is_none() {
                let allowed: Vec<&str> = Bucket::ALL.iter().map(Bucket::as_str).collect();
                errors.push(
                    "bucket",
                    format!("bucket must be one of: {}", allowed.join(", ")),
                );
            }
            parsed
        }
    };

    let limit = match parse_int(raw.limit.as_deref(), "limit", &mut errors) {
        None => DEFAULT_LIMIT,
        Some(n) if (1..=i64::from(MAX_LIMIT)).contains(&n) => n as u32,
        Some(_) => {
            errors.push("limit", "limit must be between 1 and 1000");
            DEFAULT_LIMIT
        }
    };

    let page = match parse_int(raw.page.as_deref(), "page", &mut errors) {
        None => DEFAULT_PAGE,
        Some(n) if n >= 1 && n <= i64::from(u32::MAX) => n as u32,
        Some(n) if n >= 1 => {
            errors.push("page", "page is too large");
            DEFAULT_PAGE
        }
        Some(_) => {
            errors.push("page", "page must be greater than 0");
            DEFAULT_PAGE
        }
    };

    let event_name = raw.event_name.clone().filter(|v| !v.is_empty());
    let filters = raw.filters.clone().filter(|v| !v.trim().is_empty());

    errors.into_result(RequestDescriptor {
        site_id,
        start_date,
        end_date,
        timezone,
        bucket,
        limit,
        page,
        event_name,
        filters,
    })
}

fn parse_date(raw: Option<&str>, field: &str, errors: &mut ValidationError) -> Option<NaiveDate> {
    let value = raw?;
    let shaped = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    let parsed = if shaped {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    } else {
        None
    };
    if parsed.is_none() {
        errors.push(field, "Invalid date format. Use YYYY-MM-DD");
    }
    parsed
}

/// Empty strings count as absent, matching how browsers submit blank inputs.
fn parse_int(raw: Option<&str>, field: &str, errors: &mut ValidationError) -> Option<i64> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.push(field, format!("{field} must be an integer"));
            None
        }
    }
}
