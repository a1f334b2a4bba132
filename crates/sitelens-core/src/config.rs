#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB `memory_limit`, e.g. `"1GB"`.
    pub duckdb_memory_limit: String,
    pub cors_origins: Vec<String>,
    pub session_cookie: String,
    /// Upper bound on gap-filled buckets a single series request may produce.
    pub max_buckets: usize,
}

pub const DEFAULT_MAX_BUCKETS: usize = 100_000;
pub const DEFAULT_SESSION_COOKIE: &str = "sitelens_session";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: "./data".to_string(),
            duckdb_memory_limit: "1GB".to_string(),
            cors_origins: Vec::new(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("SITELENS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("SITELENS_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("SITELENS_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            cors_origins: std::env::var("SITELENS_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            session_cookie: std::env::var("SITELENS_SESSION_COOKIE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            max_buckets: match std::env::var("SITELENS_MAX_BUCKETS") {
                Ok(raw) => raw
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("invalid SITELENS_MAX_BUCKETS: {raw}"))?,
                Err(_) => DEFAULT_MAX_BUCKETS,
            },
        })
    }

    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("sitelens.db")
    }
}
