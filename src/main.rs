//! Foresight CLI entry point.

use clap::Parser;

use foresight::cli::{commands, handle_error, Cli, Commands};
use foresight::infrastructure::config::ConfigLoader;
use foresight::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging follows the project configuration when one loads; init runs before any exists
    let log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Observe(args) => commands::observe::execute(args, cli.json).await,
        Commands::Pattern(args) => commands::pattern::execute(args, cli.json).await,
        Commands::Scenario(args) => commands::scenario::execute(args, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
