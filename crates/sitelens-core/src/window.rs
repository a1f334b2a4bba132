//! Timezone-aware report windows and gap-fill bucket boundaries.
//!
//! All calendar reasoning happens here in the request's timezone; the store
//! only ever sees UTC instants bound as query parameters.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::error::ValidationError;
use crate::params::{Bucket, RequestDescriptor};
use crate::sql::{QueryBuilder, SQL_TIMESTAMP_FORMAT};

/// Longest DST gap we search across when local midnight does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// `[start_date 00:00, end_date + 1 day 00:00)` in `timezone`, as UTC instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timezone: Tz,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, timezone: Tz) -> Self {
        let start_utc = local_midnight_utc(timezone, start_date);
        let end_utc = local_midnight_utc(timezone, end_date + Duration::days(1));
        Self {
            start_date,
            end_date,
            timezone,
            start_utc,
            end_utc,
        }
    }

    pub fn from_descriptor(params: &RequestDescriptor) -> Self {
        Self::new(params.start_date, params.end_date, params.timezone)
    }

    /// Bind both bounds and return the placeholders for use in predicates.
    pub fn bind(&self, q: &mut QueryBuilder) -> BoundWindow {
        BoundWindow {
            start: q.bind(self.start_utc.naive_utc().format(SQL_TIMESTAMP_FORMAT).to_string()),
            end: q.bind(self.end_utc.naive_utc().format(SQL_TIMESTAMP_FORMAT).to_string()),
        }
    }
}

/// Placeholders for a window already bound into a [`QueryBuilder`].
#[derive(Debug, Clone)]
pub struct BoundWindow {
    start: String,
    end: String,
}

impl BoundWindow {
    /// `column >= start AND column < end`.
    pub fn predicate(&self, column: &str) -> String {
        format!(
            "{column} >= CAST({} AS TIMESTAMP) AND {column} < CAST({} AS TIMESTAMP)",
            self.start, self.end
        )
    }
}

fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// Map a wall-clock time to UTC. Ambiguous times take the earlier instant;
/// times inside a DST gap move forward to the first instant after it.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut probe = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(a, b) => return a.min(b).with_timezone(&Utc),
            LocalResult::None => probe += Duration::minutes(1),
        }
    }
    Utc.from_utc_datetime(&naive)
}

impl Bucket {
    /// Width of sub-daily buckets. `None` for calendar buckets, which are
    /// stepped in local calendar time instead.
    pub fn fixed_width(self) -> Option<Duration> {
        match self {
            Bucket::Minute => Some(Duration::minutes(1)),
            Bucket::FiveMinutes => Some(Duration::minutes(5)),
            Bucket::TenMinutes => Some(Duration::minutes(10)),
            Bucket::FifteenMinutes => Some(Duration::minutes(15)),
            Bucket::Hour => Some(Duration::hours(1)),
            Bucket::Day | Bucket::Week | Bucket::Month | Bucket::Year => None,
        }
    }

    /// Floor a local wall-clock time to the start of its bucket.
    /// Weeks start on Monday.
    pub fn truncate(self, local: NaiveDateTime) -> NaiveDateTime {
        let date = local.date();
        match self {
            Bucket::Minute | Bucket::FiveMinutes | Bucket::TenMinutes | Bucket::FifteenMinutes => {
                let width = match self {
                    Bucket::FiveMinutes => 5,
                    Bucket::TenMinutes => 10,
                    Bucket::FifteenMinutes => 15,
                    _ => 1,
                };
                let minute = local.minute() - local.minute() % width;
                date.and_time(NaiveTime::from_hms_opt(local.hour(), minute, 0).unwrap_or(NaiveTime::MIN))
            }
            Bucket::Hour => {
                date.and_time(NaiveTime::from_hms_opt(local.hour(), 0, 0).unwrap_or(NaiveTime::MIN))
            }
            Bucket::Day => date.and_time(NaiveTime::MIN),
            Bucket::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                (date - Duration::days(back)).and_time(NaiveTime::MIN)
            }
            Bucket::Month => date
                .with_day(1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
            Bucket::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
        }
    }

    /// Next calendar bucket start after `local`. `None` on calendar overflow.
    fn next_calendar(self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Bucket::Day => local.checked_add_signed(Duration::days(1)),
            Bucket::Week => local.checked_add_signed(Duration::days(7)),
            Bucket::Month => local.checked_add_months(Months::new(1)),
            Bucket::Year => local.checked_add_months(Months::new(12)),
            _ => self.fixed_width().and_then(|w| local.checked_add_signed(w)),
        }
    }
}

/// Every bucket start for a series, plus the exclusive end of the last one.
///
/// Covers `[truncate(start), truncate(end) + 1 interval)`; the number of
/// output rows of a gap-filled series is `boundaries.len() - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPlan {
    pub bucket: Bucket,
    boundaries: Vec<DateTime<Utc>>,
}

impl BucketPlan {
    pub fn new(window: &TimeWindow, bucket: Bucket, max_buckets: usize) -> Result<Self, ValidationError> {
        let tz = window.timezone;
        let first_local = bucket.truncate(window.start_date.and_time(NaiveTime::MIN));
        let last_local = bucket.truncate(
            window
                .end_date
                .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)),
        );

        let too_many = || {
            ValidationError::single(
                "bucket",
                format!(
                    "bucket '{bucket}' yields more than {max_buckets} intervals for this date range; choose a coarser bucket"
                ),
            )
        };
        let overflow = || ValidationError::single("to", "date range is out of bounds");

        let mut boundaries = Vec::new();
        match bucket.fixed_width() {
            Some(width) => {
                let last = resolve_local(tz, last_local);
                let mut cur = resolve_local(tz, first_local);
                loop {
                    boundaries.push(cur);
                    if boundaries.len() > max_buckets {
                        return Err(too_many());
                    }
                    cur += width;
                    if cur > last {
                        boundaries.push(cur);
                        break;
                    }
                }
            }
            None => {
                let mut cur = first_local;
                loop {
                    boundaries.push(resolve_local(tz, cur));
                    if boundaries.len() > max_buckets {
                        return Err(too_many());
                    }
                    cur = bucket.next_calendar(cur).ok_or_else(overflow)?;
                    if cur > last_local {
                        boundaries.push(resolve_local(tz, cur));
                        break;
                    }
                }
            }
        }

        Ok(Self { bucket, boundaries })
    }

    pub fn bucket_count(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn boundaries(&self) -> &[DateTime<Utc>] {
        &self.boundaries
    }

    pub fn starts(&self) -> &[DateTime<Utc>] {
        &self.boundaries[..self.bucket_count()]
    }

    /// All boundaries as one comma-separated parameter value, unpacked on the
    /// store side with `string_split`.
    pub fn encoded_boundaries(&self) -> String {
        self.boundaries
            .iter()
            .map(|b| b.naive_utc().format(SQL_TIMESTAMP_FORMAT).to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
