use crate::commands::setup::build_provider;
use crate::config::Config;
use anyhow::{Context, Result};
use hearth_runtime::LLMProvider;

/// Print the models served by the endpoint and the heartbeat verdict
pub async fn execute(config: &Config) -> Result<()> {
    let provider = build_provider(config)?;
    let list = provider
        .list_models()
        .await
        .with_context(|| format!("Failed to list models at {}", provider.base_url()))?;

    for model in &list.models {
        match &model.owned_by {
            Some(owner) => println!("{}  ({})", model.id, owner),
            None => println!("{}", model.id),
        }
    }
    let alive = !list.models.is_empty();
    println!("---");
    println!("Heartbeat: {}", if alive { "ok" } else { "no models served" });
    Ok(())
}
