use crate::commands::setup::build_engine;
use crate::config::Config;
use anyhow::Result;
use hearth_gateway::{start_server, AppState};
use std::sync::Arc;
use tracing::info;

pub async fn execute(host: Option<String>, port: Option<u16>, config: &Config) -> Result<()> {
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    info!(host = %host, port, "Starting gateway server");

    let engine = Arc::new(build_engine(config).await?);
    let mut state = AppState::new(engine);
    state.allowed_origins = config.gateway.allowed_origins.clone();

    start_server(state, &host, port).await?;

    Ok(())
}
