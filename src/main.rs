use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pollroom::{
    config::AppConfig,
    server,
    state::{spawn_expiry_sweeper, AppState},
    store::MemoryPollStore,
    token::JwtAuthenticator,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pollroom...");

    let config = AppConfig::from_env();

    let store = Arc::new(MemoryPollStore::new(config.poll_duration));
    let tokens = Arc::new(JwtAuthenticator::new(&config.jwt_secret));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let sweep_interval = config.expiry_sweep_interval;
    let state = Arc::new(AppState::new(config, store.clone(), tokens));

    spawn_expiry_sweeper(state.clone(), store, sweep_interval);

    let app = server::router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
