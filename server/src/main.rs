mod routes;

use std::sync::Arc;

use sift_core::{SearchEngine, SiftConfig};
use tracing_subscriber::EnvFilter;

use routes::{AppState, RateLimiter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SiftConfig::from_env();
    let bind = config.server.bind.clone();
    let rate_limit = config.server.rate_limit_per_sec;

    let engine = Arc::new(SearchEngine::from_config(config)?);

    // The collection is created lazily too, but doing it at startup turns a
    // misconfigured vector DB into an early, visible warning.
    if let Err(e) = engine.vector_ready().await {
        tracing::warn!(error = %e, "vector DB not ready at startup, search will degrade to lexical");
    }

    let state = Arc::new(AppState {
        engine,
        limiter: RateLimiter::new(rate_limit),
    });
    let app = routes::router(state);

    tracing::info!(%bind, "sift search API listening");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
