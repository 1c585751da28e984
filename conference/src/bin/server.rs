//! Conference server.
//!
//! Reads configuration from the environment (and `.env`), connects the configured
//! entity store and cache, and serves the HTTP API until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # In-memory backends
//! cargo run --bin server
//!
//! # PostgreSQL + Redis
//! STORE_BACKEND=postgres CACHE_BACKEND=redis cargo run --bin server
//! ```

use conference::{Config, ConferenceApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🎤 Starting conference server...");
    tracing::info!(
        bind = %config.bind_address(),
        store = ?config.store.backend,
        cache = ?config.cache.backend,
        "Configuration loaded"
    );

    ConferenceApp::new(config).await?.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
