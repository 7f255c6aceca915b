mod audit;
mod campaign;
mod config;
mod db;
mod errors;
mod models;
mod normalize;
mod records;
mod routes;
mod signals;
mod state;
mod store;
mod workflow;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::fallback::FallbackStore;
use crate::store::remote::PgRemoteStore;
use crate::store::{Backend, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AdOps API v{}", env!("CARGO_PKG_VERSION"));

    // Resolve the persistence backend once; everything downstream gets it injected.
    let backend = resolve_backend(&config).await?;
    info!("Persistence backend: {}", backend.name());

    let state = AppState::new(Store::new(backend), config.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn resolve_backend(config: &Config) -> Result<Backend> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.db_max_connections).await?;
            Ok(Backend::Remote(Arc::new(PgRemoteStore::new(pool))))
        }
        None => {
            info!(
                "DATABASE_URL not set; using fallback documents in {}",
                config.data_dir.display()
            );
            Ok(Backend::Fallback(FallbackStore::new(config.data_dir.clone())))
        }
    }
}
