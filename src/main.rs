#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;

use claude_setup::cli::{Cli, Commands, ConfigCommands};
use claude_setup::config::Config;
use claude_setup::{commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_root = std::env::current_dir()?;

    // Loaded before logging so the configured level applies; an invalid
    // config only fails the commands that need it
    let config = Config::load(&project_root, cli.config.as_deref())
        .map(|config| config.with_cli_overrides(cli.verbose, cli.registry.as_deref()));

    let level = config
        .as_ref()
        .map(|config| config.logging.level.as_str())
        .unwrap_or("info");
    logging::init(level, cli.verbose);

    match &cli.command {
        Commands::Config {
            command: ConfigCommands::Validate { file },
        } => {
            commands::config::validate(&project_root, file.as_deref().or(cli.config.as_deref()))?;
        }
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            commands::config::show(&config?)?;
        }
        Commands::Agents { command } => {
            commands::agents::execute(command, &config?).await?;
        }
    }

    Ok(())
}
