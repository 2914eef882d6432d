use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use marketplace_bookings::app::{create_router, AppState, Collaborators, Repositories};
use marketplace_bookings::config::AppConfig;
use marketplace_bookings::store::InMemoryStore;
use marketplace_bookings::{db, jobs};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Marketplace bookings - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    let repositories = match config.database_url.as_deref() {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(database_url, config.database_max_connections)
                .await
                .expect("Failed to create database pool");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            Repositories::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        }
    };

    let state = AppState::build(repositories, Collaborators::default(), config.services);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_handles = jobs::spawn_jobs(&state, config.jobs, shutdown_rx);

    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Marketplace bookings is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    shutdown_tx.send(true).ok();
    for handle in job_handles {
        handle.await.ok();
    }
}
