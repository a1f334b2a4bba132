use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use sitelens_server::state::AppState;

/// `sitelens health`: liveness probe for container health checks.
///
/// Calls `GET http://localhost:$SITELENS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("SITELENS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sitelens=info".parse()?),
        )
        .json()
        .init();

    let cfg = sitelens_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = cfg.database_path();
    let db = sitelens_duckdb::DuckDbBackend::open(&db_path.to_string_lossy(), &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = sitelens_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, max_buckets = cfg.max_buckets, "sitelens listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    match tokio::time::timeout(std::time::Duration::from_secs(5), state.db.checkpoint()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Checkpoint on shutdown failed"),
        Err(_) => tracing::warn!("Checkpoint on shutdown timed out"),
    }

    Ok(())
}
