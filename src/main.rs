use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wardrobe_ai::{config::AppConfig, server, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config));
    state.prepare_dirs().await?;
    tracing::info!(datasets = %state.config.datasets_dir.display(), "datasets directory ready");

    let router = server::router(state);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Wardrobe.AI API listening on http://{}", bind_address);

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
