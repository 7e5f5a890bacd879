use financial_intelligence_engine::{agent::Orchestrator, api::start_server, config::EngineConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env as well
    let config = EngineConfig::from_env()?;

    info!(
        port = config.port,
        fallback = ?config.fallback_system,
        data_service = config.data_service_url.as_deref().unwrap_or("unset"),
        "Financial Intelligence Engine - API Server"
    );

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    info!("Orchestrator initialized");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
