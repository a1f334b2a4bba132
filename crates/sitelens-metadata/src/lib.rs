use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

/// A tracked site and the organisation that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteRecord {
    pub site_id: i64,
    /// Opaque caller-facing token, if one was issued.
    pub public_id: Option<String>,
    pub organization_id: String,
    pub name: String,
    pub domain: String,
}

/// An API key that is currently usable for a given site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub key_prefix: String,
    pub organization_id: String,
    /// `None` for organisation-wide keys.
    pub site_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Read access to the relational side of the product: sites, organisations,
/// memberships, credentials and user profiles.
///
/// The analytics API never writes through this trait except to record when
/// an API key was last used.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Map an opaque site token to its numeric id.
    async fn resolve_site_token(&self, token: &str) -> anyhow::Result<Option<i64>>;
    async fn get_site(&self, site_id: i64) -> anyhow::Result<Option<SiteRecord>>;

    /// Find an unrevoked, unexpired key with this hash that is bound to
    /// `site`, or is organisation-wide for the site's organisation.
    async fn find_api_key_for_site(
        &self,
        key_hash: &str,
        site: &SiteRecord,
    ) -> anyhow::Result<Option<ApiKeyRecord>>;
    async fn touch_api_key(&self, key_id: &str) -> anyhow::Result<()>;

    /// The user behind an unexpired session token hash.
    async fn find_session_user(&self, token_hash: &str) -> anyhow::Result<Option<SessionUser>>;
    async fn is_member(&self, organization_id: &str, user_id: &str) -> anyhow::Result<bool>;

    /// Profile traits for the given users of a site, keyed by user id.
    /// Users without a profile are absent from the map.
    async fn user_traits(
        &self,
        site_id: i64,
        user_ids: &[String],
    ) -> anyhow::Result<HashMap<String, serde_json::Value>>;
}
