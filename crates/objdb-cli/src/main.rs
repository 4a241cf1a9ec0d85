mod cli;
mod commands;
mod inventory;
mod wiring;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, port, auth_token } => {
            commands::serve(&cli.config, &cli.store, cli.worker_id, bind, port, auth_token).await
        }
        Command::Inspect { json } => commands::inspect(&cli.config, json).await,
    }
}
