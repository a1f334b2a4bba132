use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use sitelens_core::sql::SQL_TIMESTAMP_FORMAT;
use sitelens_metadata::{ApiKeyRecord, MetadataStore, SessionUser, SiteRecord};

use crate::DuckDbBackend;

fn now_param() -> String {
    Utc::now().naive_utc().format(SQL_TIMESTAMP_FORMAT).to_string()
}

#[async_trait]
impl MetadataStore for DuckDbBackend {
    async fn resolve_site_token(&self, token: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        let site_id = conn
            .prepare("SELECT site_id FROM sites WHERE id = ?1")?
            .query_map(duckdb::params![token], |row| row.get::<_, i64>(0))?
            .next()
            .transpose()?;
        Ok(site_id)
    }

    async fn get_site(&self, site_id: i64) -> Result<Option<SiteRecord>> {
        let conn = self.conn.lock().await;
        let site = conn
            .prepare("SELECT site_id, id, organization_id, name, domain FROM sites WHERE site_id = ?1")?
            .query_map(duckdb::params![site_id], |row| {
                Ok(SiteRecord {
                    site_id: row.get(0)?,
                    public_id: row.get(1)?,
                    organization_id: row.get(2)?,
                    name: row.get(3)?,
                    domain: row.get(4)?,
                })
            })?
            .next()
            .transpose()?;
        Ok(site)
    }

    async fn find_api_key_for_site(&self, key_hash: &str, site: &SiteRecord) -> Result<Option<ApiKeyRecord>> {
        let conn = self.conn.lock().await;
        let key = conn
            .prepare(
                "SELECT id, key_prefix, organization_id, site_id FROM api_keys \
                 WHERE key_hash = ?1 \
                   AND revoked_at IS NULL \
                   AND (expires_at IS NULL OR expires_at > CAST(?2 AS TIMESTAMP)) \
                   AND organization_id = ?3 \
                   AND (site_id IS NULL OR site_id = ?4)",
            )?
            .query_map(
                duckdb::params![key_hash, now_param(), site.organization_id, site.site_id],
                |row| {
                    Ok(ApiKeyRecord {
                        id: row.get(0)?,
                        key_prefix: row.get(1)?,
                        organization_id: row.get(2)?,
                        site_id: row.get(3)?,
                    })
                },
            )?
            .next()
            .transpose()?;
        Ok(key)
    }

    async fn touch_api_key(&self, key_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE api_keys SET last_used_at = CAST(?1 AS TIMESTAMP) WHERE id = ?2",
            duckdb::params![now_param(), key_id],
        )?;
        Ok(())
    }

    async fn find_session_user(&self, token_hash: &str) -> Result<Option<SessionUser>> {
        let conn = self.conn.lock().await;
        let user = conn
            .prepare(
                "SELECT s.user_id, u.email FROM auth_sessions s \
                 LEFT JOIN users u ON u.id = s.user_id \
                 WHERE s.token_hash = ?1 AND s.expires_at > CAST(?2 AS TIMESTAMP)",
            )?
            .query_map(duckdb::params![token_hash, now_param()], |row| {
                Ok(SessionUser {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                })
            })?
            .next()
            .transpose()?;
        Ok(user)
    }

    async fn is_member(&self, organization_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM members WHERE organization_id = ?1 AND user_id = ?2",
            duckdb::params![organization_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn user_traits(&self, site_id: i64, user_ids: &[String]) -> Result<HashMap<String, serde_json::Value>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        // Boxed params are not `Send`; build them only once the lock is held.
        let conn = self.conn.lock().await;
        let mut params: Vec<Box<dyn duckdb::types::ToSql>> = vec![Box::new(site_id)];
        let placeholders: Vec<String> = user_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                params.push(Box::new(id.clone()));
                format!("?{}", i + 2)
            })
            .collect();
        let sql = format!(
            "SELECT user_id, traits FROM user_profiles WHERE site_id = ?1 AND user_id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn duckdb::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut traits = HashMap::new();
        for row in rows {
            let (user_id, raw) = row?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    traits.insert(user_id, value);
                }
                Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Skipping malformed user traits"),
            }
        }
        Ok(traits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    async fn fixture() -> (DuckDbBackend, SiteRecord) {
        let db = DuckDbBackend::open_in_memory().unwrap();
        db.create_organization("org_a", "Acme").await.unwrap();
        db.create_organization("org_b", "Other").await.unwrap();
        db.create_site(1, Some("acme_public_token"), "org_a", "Acme", "acme.test")
            .await
            .unwrap();
        db.create_site(2, None, "org_a", "Acme Docs", "docs.acme.test")
            .await
            .unwrap();
        let site = db.get_site(1).await.unwrap().unwrap();
        (db, site)
    }

    #[tokio::test]
    async fn opaque_tokens_resolve_to_numeric_ids() {
        let (db, site) = fixture().await;
        assert_eq!(site.public_id.as_deref(), Some("acme_public_token"));
        assert_eq!(db.resolve_site_token("acme_public_token").await.unwrap(), Some(1));
        assert_eq!(db.resolve_site_token("missing_token_x").await.unwrap(), None);
        assert!(db.get_site(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_keys_are_scoped_to_site_or_organisation() {
        let (db, site) = fixture().await;
        let docs = db.get_site(2).await.unwrap().unwrap();
        let (_, site_key) = db.create_api_key("org_a", Some(1), None).await.unwrap();
        let (_, org_key) = db.create_api_key("org_a", None, None).await.unwrap();
        let (_, foreign_key) = db.create_api_key("org_b", None, None).await.unwrap();

        let hash = sitelens_core::secret::hash_secret;
        assert!(db.find_api_key_for_site(&hash(&site_key), &site).await.unwrap().is_some());
        assert!(db.find_api_key_for_site(&hash(&site_key), &docs).await.unwrap().is_none());
        assert!(db.find_api_key_for_site(&hash(&org_key), &docs).await.unwrap().is_some());
        assert!(db.find_api_key_for_site(&hash(&foreign_key), &site).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoked_and_expired_keys_are_ignored() {
        let (db, site) = fixture().await;
        let (revoked_id, revoked) = db.create_api_key("org_a", Some(1), None).await.unwrap();
        db.revoke_api_key(&revoked_id).await.unwrap();
        let (_, expired) = db
            .create_api_key("org_a", Some(1), Some(Utc::now() - Duration::hours(1)))
            .await
            .unwrap();

        let hash = sitelens_core::secret::hash_secret;
        assert!(db.find_api_key_for_site(&hash(&revoked), &site).await.unwrap().is_none());
        assert!(db.find_api_key_for_site(&hash(&expired), &site).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_records_last_use() {
        let (db, _) = fixture().await;
        let (id, _) = db.create_api_key("org_a", None, None).await.unwrap();
        db.touch_api_key(&id).await.unwrap();
        let conn = db.conn_for_test().await;
        let touched: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM api_keys WHERE id = ?1 AND last_used_at IS NOT NULL",
                duckdb::params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(touched, 1);
    }

    #[tokio::test]
    async fn sessions_resolve_until_expiry() {
        let (db, _) = fixture().await;
        db.create_user("user_1", Some("a@acme.test")).await.unwrap();
        db.add_member("org_a", "user_1").await.unwrap();
        let live = db.create_auth_session("user_1", Duration::days(1)).await.unwrap();
        let stale = db.create_auth_session("user_1", Duration::days(-1)).await.unwrap();

        let hash = sitelens_core::secret::hash_secret;
        let user = db.find_session_user(&hash(&live)).await.unwrap().unwrap();
        assert_eq!(user.user_id, "user_1");
        assert_eq!(user.email.as_deref(), Some("a@acme.test"));
        assert!(db.find_session_user(&hash(&stale)).await.unwrap().is_none());
        assert!(db.is_member("org_a", "user_1").await.unwrap());
        assert!(!db.is_member("org_b", "user_1").await.unwrap());
    }

    #[tokio::test]
    async fn traits_are_keyed_by_user() {
        let (db, _) = fixture().await;
        db.set_user_traits(1, "u1", &json!({"plan": "pro"})).await.unwrap();
        db.set_user_traits(2, "u2", &json!({"plan": "free"})).await.unwrap();

        let traits = db
            .user_traits(1, &["u1".to_string(), "u2".to_string()])
            .await
            .unwrap();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits["u1"], json!({"plan": "pro"}));
        assert!(db.user_traits(1, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn setting_traits_again_replaces_them() {
        let (db, _) = fixture().await;
        db.set_user_traits(1, "u1", &json!({"plan": "free"})).await.unwrap();
        db.set_user_traits(1, "u1", &json!({"plan": "pro", "seats": 5})).await.unwrap();

        let traits = db.user_traits(1, &["u1".to_string()]).await.unwrap();
        assert_eq!(traits["u1"], json!({"plan": "pro", "seats": 5}));
    }
}
