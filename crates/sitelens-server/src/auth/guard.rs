use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap},
};
use chrono::Utc;
use tracing::{debug, warn};

use sitelens_core::filter::{parse_filters, FilterExpr};
use sitelens_core::params::{normalize, RawParams, RequestDescriptor};
use sitelens_core::secret::hash_secret;
use sitelens_core::window::TimeWindow;
use sitelens_duckdb::queries::{Page, ReportScope};
use sitelens_metadata::SiteRecord;

use super::credentials::{bearer_token, cookie_value};
use super::site::resolve_site;
use crate::envelope::Meta;
use crate::error::ApiError;
use crate::state::AppState;

const MISSING_CREDENTIALS: &str = "Authorization required. Use Bearer token with API key.";
const INVALID_API_KEY: &str = "Invalid or expired API key";

/// Who was allowed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    ApiKey { key_id: String },
    Session { user_id: String },
}

/// Everything a report handler needs, produced once per request by the
/// access guard: validated parameters, the parsed filter, the resolved site
/// and the principal that was authorised for it.
///
/// Extraction order is validation, then site resolution, then credentials,
/// so a malformed request is rejected before any store lookup.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub site: SiteRecord,
    pub params: RequestDescriptor,
    pub window: TimeWindow,
    pub filter: Option<FilterExpr>,
    pub principal: Principal,
}

impl SiteContext {
    pub fn site_id(&self) -> i64 {
        self.site.site_id
    }

    pub fn scope(&self) -> ReportScope<'_> {
        ReportScope {
            site_id: self.site.site_id,
            window: &self.window,
            filter: self.filter.as_ref(),
        }
    }

    pub fn page(&self) -> Page {
        Page {
            limit: self.params.limit,
            offset: self.params.offset(),
        }
    }

    pub fn meta(&self) -> Meta {
        Meta::new(self.site.site_id, &self.params)
    }
}

impl FromRequestParts<Arc<AppState>> for SiteContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        let params = normalize(&raw, Utc::now().date_naive())?;
        let filter = match params.filters.as_deref() {
            Some(raw_filters) => parse_filters(raw_filters)?,
            None => None,
        };

        let site = resolve_site(state.metadata.as_ref(), &params.site_id).await?;
        let principal = authorize(state, &parts.headers, &site).await?;

        Ok(Self {
            window: TimeWindow::from_descriptor(&params),
            site,
            params,
            filter,
            principal,
        })
    }
}

/// Check the request's credentials against `site`.
///
/// A bearer API key is tried first; when it is absent or rejected, the
/// session cookie is tried. The cookie's user must belong to the site's
/// organisation.
pub async fn authorize(state: &AppState, headers: &HeaderMap, site: &SiteRecord) -> Result<Principal, ApiError> {
    let bearer = bearer_token(headers);

    if let Some(raw_key) = bearer {
        let key = state
            .metadata
            .find_api_key_for_site(&hash_secret(raw_key), site)
            .await
            .map_err(ApiError::storage("api key"))?;
        match key {
            Some(key) => {
                debug!(site_id = site.site_id, key_prefix = %key.key_prefix, "Authorised by API key");
                let metadata = Arc::clone(&state.metadata);
                let key_id = key.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = metadata.touch_api_key(&key_id).await {
                        warn!(error = %e, "Failed to record API key use");
                    }
                });
                return Ok(Principal::ApiKey { key_id: key.id });
            }
            None => warn!(site_id = site.site_id, "Rejected API key"),
        }
    }

    if let Some(token) = cookie_value(headers, &state.config.session_cookie) {
        let user = state
            .metadata
            .find_session_user(&hash_secret(&token))
            .await
            .map_err(ApiError::storage("session"))?;
        if let Some(user) = user {
            let member = state
                .metadata
                .is_member(&site.organization_id, &user.user_id)
                .await
                .map_err(ApiError::storage("session"))?;
            if member {
                debug!(site_id = site.site_id, user_id = %user.user_id, "Authorised by session");
                return Ok(Principal::Session { user_id: user.user_id });
            }
            debug!(site_id = site.site_id, user_id = %user.user_id, "Session user is not a member");
        }
    }

    let message = if bearer.is_some() {
        INVALID_API_KEY
    } else {
        MISSING_CREDENTIALS
    };
    Err(ApiError::Unauthorized(message.to_string()))
}
