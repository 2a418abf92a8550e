use std::sync::Arc;
use ticker_digest::{
    api::{build_state, start_server},
    config::AppConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    info!("Ticker Digest - API Server");
    info!("Port: {}", config.port);
    info!(
        max_concurrent_categories = config.max_concurrent_categories,
        request_timeout_secs = config.request_timeout.as_secs(),
        "Aggregator limits"
    );

    let state = build_state(config)?;

    info!("Collaborators initialized");
    info!("Starting API server...");

    start_server(state).await?;

    Ok(())
}
