//! Peerline CLI entry point

use clap::Parser;
use tracing::{error, info};

use peerline_cli::{cli::Cli, commands::CommandDispatcher, config::CliAppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(&cli)?;

    setup_logging(cli.verbose || config.cli.verbose);

    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("Peerline CLI exited");
    Ok(())
}

/// Setup logging based on verbosity level; logs go to stderr so stdout stays
/// free for the event stream
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<CliAppConfig> {
    match &cli.config {
        Some(path) => CliAppConfig::load_from_file(path),
        None => Ok(CliAppConfig::default()),
    }
}
