//! The `{success, data, meta}` / `{success, error, statusCode}` wrappers every
//! endpoint responds with.

use axum::{http::StatusCode, Json};
use serde::Serialize;

use sitelens_core::params::RequestDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub site_id: i64,
    pub from: String,
    pub to: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
}

impl Meta {
    pub fn new(site_id: i64, params: &RequestDescriptor) -> Self {
        Self {
            site_id,
            from: params.from_label(),
            to: params.to_label(),
            timezone: params.timezone.name().to_string(),
            page: None,
            limit: None,
            total_count: None,
        }
    }

    /// Pagination fields for list endpoints.
    pub fn paged(mut self, params: &RequestDescriptor, total_count: i64) -> Self {
        self.page = Some(params.page);
        self.limit = Some(params.limit);
        self.total_count = Some(total_count);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub success: bool,
    pub error: String,
    pub status_code: u16,
}

pub fn success<T: Serialize>(data: T, meta: Meta) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        meta,
    })
}

pub fn failure(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Failure>) {
    (
        status,
        Json(Failure {
            success: false,
            error: error.into(),
            status_code: status.as_u16(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor {
            site_id: "4".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            timezone: chrono_tz::Europe::Berlin,
            bucket: None,
            limit: 25,
            page: 2,
            event_name: None,
            filters: None,
        }
    }

    #[test]
    fn meta_omits_pagination_unless_paged() {
        let meta = Meta::new(4, &descriptor());
        assert_eq!(
            serde_json::to_value(success(json!([]), meta).0).unwrap(),
            json!({
                "success": true,
                "data": [],
                "meta": {"siteId": 4, "from": "2024-03-01", "to": "2024-03-07", "timezone": "Europe/Berlin"}
            })
        );
    }

    #[test]
    fn paged_meta_carries_total_count() {
        let meta = Meta::new(4, &descriptor()).paged(&descriptor(), 51);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["page"], 2);
        assert_eq!(value["limit"], 25);
        assert_eq!(value["totalCount"], 51);
    }

    #[test]
    fn failure_mirrors_status_code() {
        let (status, body) = failure(StatusCode::NOT_FOUND, "Site not found");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&body.0).unwrap(),
            json!({"success": false, "error": "Site not found", "statusCode": 404})
        );
    }
}
