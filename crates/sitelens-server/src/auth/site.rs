use sitelens_metadata::{MetadataStore, SiteRecord};

use crate::error::ApiError;

/// Site ids up to this many characters are numeric; longer ones are opaque tokens.
pub const NUMERIC_ID_MAX_LEN: usize = 10;
pub const TOKEN_MAX_LEN: usize = 64;

/// How the caller named the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteRef {
    Numeric(i64),
    Token(String),
}

fn invalid_format() -> ApiError {
    ApiError::Validation("siteId: Invalid site id format".to_string())
}

pub fn parse_site_ref(raw: &str) -> Result<SiteRef, ApiError> {
    if raw.len() > NUMERIC_ID_MAX_LEN {
        let valid = raw.len() <= TOKEN_MAX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        return if valid {
            Ok(SiteRef::Token(raw.to_string()))
        } else {
            Err(invalid_format())
        };
    }
    match raw.parse::<i64>() {
        Ok(id) if id > 0 && raw.bytes().all(|b| b.is_ascii_digit()) => Ok(SiteRef::Numeric(id)),
        _ => Err(invalid_format()),
    }
}

/// Resolve the caller's `siteId` to an existing site record.
pub async fn resolve_site(metadata: &dyn MetadataStore, raw: &str) -> Result<SiteRecord, ApiError> {
    let site_id = match parse_site_ref(raw)? {
        SiteRef::Numeric(id) => id,
        SiteRef::Token(token) => metadata
            .resolve_site_token(&token)
            .await
            .map_err(ApiError::storage("site"))?
            .ok_or_else(site_not_found)?,
    };
    metadata
        .get_site(site_id)
        .await
        .map_err(ApiError::storage("site"))?
        .ok_or_else(site_not_found)
}

fn site_not_found() -> ApiError {
    ApiError::NotFound("Site not found".to_string())
}
