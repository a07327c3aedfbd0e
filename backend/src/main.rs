use std::sync::Arc;

use tokio::net::TcpListener;

use warden_backend::{app, logging, AppState, Config, JwksClient, SqliteUserStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    logging::init(&config.logging.level);

    tracing::info!("Starting Warden admin gateway");

    // Initialize components
    let store = SqliteUserStore::new(&config.database.url)?;
    let identity = JwksClient::new(&config.oidc.issuer, &config.oidc.audience).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, Arc::new(store), Arc::new(identity)));

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
