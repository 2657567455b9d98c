use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use concert_api::{app, worker, AppState};
use concert_store::{app_config::Config, DbClient, MemoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concert_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting concert service on port {}", config.server.port);

    let app_state = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            AppState::postgres(&db, &config)
        }
        None => {
            tracing::warn!("No database.url configured, using the in-memory store with the sample catalog");
            AppState::in_memory(Arc::new(MemoryStore::with_sample_catalog()), &config)
        }
    };

    // Background purge of lapsed reservations
    let every = Duration::from_secs(config.business_rules.purge_interval_seconds.max(1));
    tokio::spawn(worker::start_purge_worker(app_state.reservations.clone(), every));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
