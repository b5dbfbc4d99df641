mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    hearth_runtime::init_logging();

    let cli = Cli::parse();

    // Init runs before a config exists
    if let Commands::Init { path } = &cli.command {
        return commands::init::run_init(path);
    }

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Serve { host, port } => {
            commands::serve::execute(host, port, &config).await?;
        }
        Commands::Chat { session } => {
            commands::chat::execute(session, &config).await?;
        }
        Commands::Models => {
            commands::models::execute(&config).await?;
        }
    }

    Ok(())
}
