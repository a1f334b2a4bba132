/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// Every statement uses `IF NOT EXISTS` so it is safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `SITELENS_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default of 80% of system RAM is not acceptable for a
/// server process.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- TENANCY
-- ===========================================
CREATE TABLE IF NOT EXISTS organizations (
    id              VARCHAR PRIMARY KEY,
    name            VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sites (
    site_id         BIGINT PRIMARY KEY,
    id              VARCHAR UNIQUE,                -- opaque caller-facing token
    organization_id VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    domain          VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS users (
    id              VARCHAR PRIMARY KEY,
    email           VARCHAR,
    name            VARCHAR
);

CREATE TABLE IF NOT EXISTS members (
    organization_id VARCHAR NOT NULL,
    user_id         VARCHAR NOT NULL,
    role            VARCHAR NOT NULL DEFAULT 'member',
    PRIMARY KEY (organization_id, user_id)
);

-- ===========================================
-- CREDENTIALS
-- ===========================================
CREATE TABLE IF NOT EXISTS auth_sessions (
    token_hash      VARCHAR(64) PRIMARY KEY,       -- sha256(raw token); never stored raw
    user_id         VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at      TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS api_keys (
    id              VARCHAR PRIMARY KEY,
    key_hash        VARCHAR(64) NOT NULL UNIQUE,   -- sha256(raw key); never stored raw
    key_prefix      VARCHAR NOT NULL,
    organization_id VARCHAR NOT NULL,
    site_id         BIGINT,                        -- NULL = every site in the organisation
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at      TIMESTAMP,
    revoked_at      TIMESTAMP,
    last_used_at    TIMESTAMP
);

-- ===========================================
-- PROFILES
-- ===========================================
CREATE TABLE IF NOT EXISTS user_profiles (
    site_id         BIGINT NOT NULL,
    user_id         VARCHAR NOT NULL,
    traits          VARCHAR NOT NULL,              -- JSON object
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (site_id, user_id)
);

-- ===========================================
-- EVENTS
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id               VARCHAR PRIMARY KEY,
    site_id          BIGINT NOT NULL,
    session_id       VARCHAR NOT NULL,
    user_id          VARCHAR NOT NULL,
    event_type       VARCHAR NOT NULL,             -- 'pageview' | 'custom_event'
    hostname         VARCHAR,
    pathname         VARCHAR,
    querystring      VARCHAR,
    page_title       VARCHAR,
    referrer         VARCHAR,
    event_name       VARCHAR,
    props            VARCHAR,                      -- JSON object
    browser          VARCHAR,
    operating_system VARCHAR,
    device_type      VARCHAR,
    country          VARCHAR,
    region           VARCHAR,
    city             VARCHAR,
    language         VARCHAR,
    utm_source       VARCHAR,
    utm_medium       VARCHAR,
    utm_campaign     VARCHAR,
    created_at       TIMESTAMP NOT NULL            -- UTC
);

CREATE INDEX IF NOT EXISTS idx_events_site_time ON events(site_id, created_at);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(site_id, session_id);
"#
    )
}
