//! mavbt - forward MAVLink frames to a Bluetooth peripheral

use std::path::Path;

use clap::Parser;
use tracing::{error, info};

use mavlink_bt_cli::{
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::CliAppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so the file can enable verbose output
    let config = load_configuration(&cli)?;
    setup_logging(config.cli.verbose);

    if let Err(e) = CommandDispatcher::execute(cli.command, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("mavbt exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load layered configuration with command line overrides
fn load_configuration(cli: &Cli) -> Result<CliAppConfig> {
    let transport = match &cli.command {
        Commands::Connect { transport, .. } => transport.map(Into::into),
        Commands::Config { .. } => None,
    };
    let verbose = cli.verbose.then_some(true);

    Ok(CliAppConfig::load_with_overrides(
        cli.config.as_deref().map(Path::new),
        transport,
        verbose,
    )?)
}
