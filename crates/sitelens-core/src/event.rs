use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PAGEVIEW: &str = "pageview";
pub const CUSTOM_EVENT: &str = "custom_event";

/// A stored analytics event; mirrors the DuckDB `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub site_id: i64,
    pub session_id: String,
    pub user_id: String,
    /// `"pageview"` or `"custom_event"`.
    pub event_type: String,
    pub hostname: Option<String>,
    pub pathname: Option<String>,
    pub querystring: Option<String>,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub event_name: Option<String>,
    /// Serialized JSON object of custom properties.
    pub props: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub device_type: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub language: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// A pageview with every optional dimension unset.
    pub fn pageview(site_id: i64, session_id: &str, user_id: &str, pathname: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            site_id,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            event_type: PAGEVIEW.to_string(),
            hostname: None,
            pathname: Some(pathname.to_string()),
            querystring: None,
            page_title: None,
            referrer: None,
            event_name: None,
            props: None,
            browser: None,
            operating_system: None,
            device_type: None,
            country: None,
            region: None,
            city: None,
            language: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            timestamp,
        }
    }

    pub fn custom(site_id: i64, session_id: &str, user_id: &str, name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: CUSTOM_EVENT.to_string(),
            pathname: None,
            event_name: Some(name.to_string()),
            ..Self::pageview(site_id, session_id, user_id, "", timestamp)
        }
    }

    pub fn is_pageview(&self) -> bool {
        self.event_type == PAGEVIEW
    }
}
