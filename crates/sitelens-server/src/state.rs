use std::sync::Arc;

use sitelens_core::analytics::EventStore;
use sitelens_core::config::Config;
use sitelens_duckdb::DuckDbBackend;
use sitelens_metadata::MetadataStore;

/// Process-wide resources shared by every request.
///
/// One DuckDB database backs both collaborators; handlers only see them
/// through the [`EventStore`] and [`MetadataStore`] traits. `db` is kept for
/// lifecycle work (checkpoint on shutdown).
pub struct AppState {
    pub db: Arc<DuckDbBackend>,
    pub events: Arc<dyn EventStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        Self {
            events: db.clone(),
            metadata: db.clone(),
            db,
            config,
        }
    }

    /// Build state around collaborators other than DuckDB (used by tests that
    /// need to simulate storage failures).
    pub fn with_stores(
        db: Arc<DuckDbBackend>,
        events: Arc<dyn EventStore>,
        metadata: Arc<dyn MetadataStore>,
        config: Config,
    ) -> Self {
        Self {
            db,
            events,
            metadata,
            config,
        }
    }
}
