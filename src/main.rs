use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jumping_backend::{
    api::{self, AppState},
    config::Config,
    constants::API_VERSION,
    services::GameService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jumping_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting jumping backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Network: {} ({})", config.network.as_str(), config.rpc_url);
    tracing::info!("API Version: {}", API_VERSION);
    if !config.backend_submit {
        tracing::info!("BACKEND_SUBMIT is off; starts are returned for wallet signing");
    }

    let game = Arc::new(GameService::from_config(&config)?);

    let app = api::build_router(AppState {
        config: config.clone(),
        game,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST/PORT: {}", e))?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
