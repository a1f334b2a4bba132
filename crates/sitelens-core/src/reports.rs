//! Row shapes returned by the public analytics endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate metrics over one window (or one bucket of a series).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewStats {
    pub sessions: i64,
    pub pageviews: i64,
    pub users: i64,
    pub pages_per_session: f64,
    /// Fraction of sessions with exactly one pageview, in `[0, 1]`.
    pub bounce_rate: f64,
    /// Mean session length in seconds.
    pub session_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Bucket start as an ISO-8601 UTC instant.
    pub time: String,
    #[serde(flatten)]
    pub stats: OverviewStats,
}

/// One pageview or custom event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub timestamp: String,
    pub event_type: String,
    pub event_name: Option<String>,
    pub session_id: String,
    pub user_id: String,
    pub hostname: Option<String>,
    pub pathname: Option<String>,
    pub querystring: Option<String>,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
    pub props: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: String,
    pub user_id: String,
    pub session_start: String,
    pub session_end: String,
    pub session_duration: i64,
    pub pageviews: i64,
    pub events: i64,
    pub entry_page: Option<String>,
    pub exit_page: Option<String>,
    pub hostname: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub traits: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: String,
    pub sessions: i64,
    pub pageviews: i64,
    pub events: i64,
    pub first_seen: String,
    pub last_seen: String,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub traits: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRow {
    pub total: i64,
}

/// Rows that can carry profile traits looked up by user id.
pub trait HasTraits {
    fn user_id(&self) -> &str;
    fn set_traits(&mut self, traits: Value);
}

impl HasTraits for SessionRow {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn set_traits(&mut self, traits: Value) {
        self.traits = Some(traits);
    }
}

impl HasTraits for UserRow {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn set_traits(&mut self, traits: Value) {
        self.traits = Some(traits);
    }
}
