use anyhow::Result;
use gateway::{build_state, create_router, settings::Settings};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting pindrop gateway");

    let settings = Settings::load()?;
    settings.validate().map_err(anyhow::Error::msg)?;

    let state = build_state(&settings).await?;
    let app = create_router(state);

    let address = settings.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Gateway listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
