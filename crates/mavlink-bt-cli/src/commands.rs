//! Command handlers for the mavbt CLI

use tracing::info;

use crate::app::LinkApp;
use crate::cli::Commands;
use crate::config::CliAppConfig;
use crate::error::Result;
use crate::input::FrameSource;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, config: CliAppConfig) -> Result<()> {
        match command {
            Commands::Connect {
                address,
                udp,
                stdin,
                ..
            } => {
                let source = frame_source(&config, udp, stdin);
                Self::handle_connect_command(config, address, source).await
            }
            Commands::Config { output } => Self::handle_config_command(output),
        }
    }

    async fn handle_connect_command(
        config: CliAppConfig,
        address: String,
        source: FrameSource,
    ) -> Result<()> {
        let app = LinkApp::new(config).await?;
        app.run(&address, source).await
    }

    fn handle_config_command(output: Option<String>) -> Result<()> {
        match output {
            Some(path) => {
                CliAppConfig::example().save_to_file(&path)?;
                info!("Example configuration written to {}", path);
            }
            None => println!("{}", CliAppConfig::example_config()),
        }
        Ok(())
    }
}

/// Command line input selection over the configured UDP bind address
pub fn frame_source(config: &CliAppConfig, udp: Option<String>, stdin: bool) -> FrameSource {
    if stdin {
        FrameSource::Stdin
    } else {
        FrameSource::Udp(udp.unwrap_or_else(|| config.input.udp_bind.clone()))
    }
}
