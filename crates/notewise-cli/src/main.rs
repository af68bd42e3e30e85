mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use notewise_memory::NotewiseConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = dispatch(cli).await {
        error::handle_error(err);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let format = cli.format;
    match cli.command {
        Commands::Resolve { task, filename } => commands::resolve::run(&task, &filename, format),
        Commands::History { command } => {
            let config = load_config(cli.config.as_deref())?;
            commands::history::run(&config, command, format).await
        }
        Commands::Cleanup { notes_root } => {
            let config = load_config(cli.config.as_deref())?;
            commands::cleanup::run(&config, notes_root, format)
        }
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::run::run(&config, args, format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<NotewiseConfig> {
    let config = match path {
        Some(path) => NotewiseConfig::load_from(path)?,
        None => NotewiseConfig::load()?,
    };
    tracing::debug!(sessions_dir = %config.sessions_dir.display(), "Configuration loaded");
    Ok(config)
}
