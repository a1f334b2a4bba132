use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use sitelens_core::event::Event;

use crate::schema::init_sql;

/// Generate a cryptographically random hex string of `n` bytes (2n hex chars).
pub(crate) fn rand_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Embedded DuckDB database holding both the event log and the relational
/// metadata (sites, organisations, credentials, profiles).
///
/// The primary connection sits behind `Arc<Mutex<_>>`; writes go through it
/// directly. Read queries clone a connection handle to the same database so
/// independent queries of one request (rows + total count) run in parallel
/// on the blocking pool.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests; data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A second handle onto the same database for a read query.
    ///
    /// The lock is held only while cloning, so callers can run the returned
    /// connection on a blocking thread without serialising other readers.
    pub(crate) async fn reader(&self) -> Result<Connection> {
        let conn = self.conn.lock().await;
        Ok(conn.try_clone()?)
    }

    /// Insert a batch of events in a single transaction.
    ///
    /// Returns immediately (no-op) if `events` is empty.
    pub async fn insert_events(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for event in events {
            tx.execute(
                r#"INSERT INTO events (
                    id, site_id, session_id, user_id, event_type,
                    hostname, pathname, querystring, page_title, referrer,
                    event_name, props,
                    browser, operating_system, device_type,
                    country, region, city, language,
                    utm_source, utm_medium, utm_campaign,
                    created_at
                ) VALUES (
                    ?1,  ?2,  ?3,  ?4,  ?5,
                    ?6,  ?7,  ?8,  ?9,  ?10,
                    ?11, ?12,
                    ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19,
                    ?20, ?21, ?22,
                    CAST(?23 AS TIMESTAMP)
                )"#,
                duckdb::params![
                    event.id,
                    event.site_id,
                    event.session_id,
                    event.user_id,
                    event.event_type,
                    event.hostname,
                    event.pathname,
                    event.querystring,
                    event.page_title,
                    event.referrer,
                    event.event_name,
                    event.props,
                    event.browser,
                    event.operating_system,
                    event.device_type,
                    event.country,
                    event.region,
                    event.city,
                    event.language,
                    event.utm_source,
                    event.utm_medium,
                    event.utm_campaign,
                    event.timestamp.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!("Inserted {} events into DuckDB", events.len());
        Ok(())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Flush the WAL into the database file. Run once during shutdown.
    pub async fn checkpoint(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("CHECKPOINT")?;
        info!("DuckDB checkpoint complete");
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
