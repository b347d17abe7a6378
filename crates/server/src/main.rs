//! kopibot server binary.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use kopibot_config::Settings;
use kopibot_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    let address = format!("{}:{}", settings.server.host, settings.server.port);

    let state = AppState::from_settings(settings).context("failed to build application state")?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!(address = %address, "kopibot server listening");

    axum::serve(listener, router)
        .await
        .context("server exited with error")?;

    Ok(())
}
