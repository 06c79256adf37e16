//! Error handling for the mavbt CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Link error: {0}")]
    Link(#[from] mavlink_bt_core::LinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Link ended: {0}")]
    LinkEnded(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Input(format!("{:#}", err))
    }
}
