use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth - LLM conversation agent for Home Assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "hearth.toml")]
        path: PathBuf,
    },
    /// Start the HTTP conversation gateway
    Serve {
        /// Host to bind to (overrides [gateway].host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides [gateway].port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Interactive conversation on stdin
    Chat {
        /// Continue an existing conversation by ID
        #[arg(long)]
        session: Option<String>,
    },
    /// List models served by the LLM endpoint
    Models,
}
