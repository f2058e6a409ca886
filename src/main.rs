use std::sync::Arc;

use safewalk::api::{self, AppState};
use safewalk::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("safewalk=info,tower_http=info")),
        )
        .init();

    // 1. Load settings (severity weights, bind address)
    let config = Config::load()?;
    info!(weights = ?config.severity_weights, "configuration loaded");

    // 2. Hazard zones start empty and arrive through PUT /hazards
    let bind_addr = config.bind_addr.clone();
    let shared_state = Arc::new(AppState::new(config));

    // 3. Setup Router
    let app = api::router(shared_state);

    info!("API server running on http://{bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
