//! Bootstrapping helpers for the relational tables.
//!
//! Organisation and member management belong to the dashboard product; the
//! analytics API only reads these tables. These helpers exist so a fresh
//! install (and the test suites) can create the rows it needs.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use sitelens_core::secret::hash_secret;
use sitelens_core::sql::SQL_TIMESTAMP_FORMAT;

use crate::backend::rand_hex;
use crate::DuckDbBackend;

/// Length of the displayable key prefix stored next to the hash.
const KEY_PREFIX_LEN: usize = 12;

fn ts_param(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format(SQL_TIMESTAMP_FORMAT).to_string()
}

impl DuckDbBackend {
    pub async fn create_organization(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO organizations (id, name) VALUES (?1, ?2) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
            duckdb::params![id, name],
        )?;
        Ok(())
    }

    /// Register a site. `public_id` is the optional opaque token
    /// callers may use instead of the numeric id.
    pub async fn create_site(
        &self,
        site_id: i64,
        public_id: Option<&str>,
        organization_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sites (site_id, id, organization_id, name, domain) VALUES (?1, ?2, ?3, ?4, ?5)",
            duckdb::params![site_id, public_id, organization_id, name, domain],
        )?;
        Ok(())
    }

    pub async fn create_user(&self, id: &str, email: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (id, email) VALUES (?1, ?2) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email",
            duckdb::params![id, email],
        )?;
        Ok(())
    }

    pub async fn add_member(&self, organization_id: &str, user_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO members (organization_id, user_id) VALUES (?1, ?2)",
            duckdb::params![organization_id, user_id],
        )?;
        Ok(())
    }

    /// Issue a new API key. Returns `(key_id, raw_key)`; only the SHA-256 of
    /// the raw key is stored, so it cannot be shown again.
    ///
    /// `site_id = None` makes the key valid for every site of the organisation.
    pub async fn create_api_key(
        &self,
        organization_id: &str,
        site_id: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(String, String)> {
        let id = format!("key_{}", rand_hex(5));
        let raw_key = format!("slk_{}", rand_hex(16));
        let prefix = raw_key[..KEY_PREFIX_LEN].to_string();

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO api_keys (id, key_hash, key_prefix, organization_id, site_id, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, CAST(?6 AS TIMESTAMP))",
            duckdb::params![
                id,
                hash_secret(&raw_key),
                prefix,
                organization_id,
                site_id,
                expires_at.map(ts_param),
            ],
        )?;
        Ok((id, raw_key))
    }

    pub async fn revoke_api_key(&self, key_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE api_keys SET revoked_at = CAST(?1 AS TIMESTAMP) WHERE id = ?2 AND revoked_at IS NULL",
            duckdb::params![ts_param(Utc::now()), key_id],
        )?;
        Ok(changed > 0)
    }

    /// Start a login session for `user_id`; returns the raw cookie token.
    pub async fn create_auth_session(&self, user_id: &str, ttl: Duration) -> Result<String> {
        let token = rand_hex(32);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO auth_sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, CAST(?3 AS TIMESTAMP))",
            duckdb::params![hash_secret(&token), user_id, ts_param(Utc::now() + ttl)],
        )?;
        Ok(token)
    }

    pub async fn set_user_traits(&self, site_id: i64, user_id: &str, traits: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_profiles (site_id, user_id, traits) VALUES (?1, ?2, ?3) \
             ON CONFLICT (site_id, user_id) DO UPDATE SET traits = EXCLUDED.traits, updated_at = now()",
            duckdb::params![site_id, user_id, traits.to_string()],
        )?;
        Ok(())
    }
}
