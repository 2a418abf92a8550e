use std::sync::Arc;
use ticker_digest::{api::build_state, config::AppConfig, QuoteRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// One-shot aggregate: `digest <TICKER> [WRITEKEY]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(ticker) = args.next() else {
        eprintln!("usage: digest <TICKER> [WRITEKEY]");
        std::process::exit(2);
    };
    let write_key = args.next();

    let config = Arc::new(AppConfig::from_env()?);
    let state = build_state(config)?;

    info!(ticker = %ticker, "Running one-shot aggregate");

    let outcome = state
        .orchestrator
        .handle(QuoteRequest::new(ticker, write_key), "cli")
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome.inference)?);
    eprintln!("Audit ID: {}", outcome.audit_id);
    for category in &outcome.categories {
        eprintln!("  {}: {:?}", category.category, category.state);
    }

    state.store.close().await;

    if let Some(e) = outcome.persistence_error {
        eprintln!("Persistence failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
