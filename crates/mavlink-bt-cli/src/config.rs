//! mavbt configuration management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - Configuration file (`mavbt.toml` or the path given with `--config`)
//! - Environment variables (`MAVBT_*`, nested with `__`, for example
//!   `MAVBT_FORWARDER__TRANSPORT=spp`)
//! - Command line arguments

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use mavlink_bt_ble::BleAdapterConfig;
use mavlink_bt_core::{ForwarderConfig, TransportPolicy};
use mavlink_bt_spp::SppConfig;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "mavbt.toml";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the mavbt application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Link forwarder behavior
    pub forwarder: ForwarderConfig,

    /// btleplug adapter settings
    pub ble: BleAdapterConfig,

    /// Serial port profile settings
    pub spp: SppConfig,

    /// Where outbound MAVLink bytes come from
    pub input: InputConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// Source of outbound MAVLink bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// UDP address datagrams are received on
    pub udp_bind: String,

    /// Largest datagram or stdin read forwarded in one piece
    pub read_buffer_size: usize,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Enable verbose logging output
    pub verbose: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            udp_bind: "127.0.0.1:14550".to_string(),
            read_buffer_size: 2048,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliAppConfig {
    fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("MAVBT_").split("__"))
    }

    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_overrides(path, None, None)
    }

    /// Load configuration and apply command line overrides on top
    pub fn load_with_overrides(
        path: Option<&Path>,
        transport: Option<TransportPolicy>,
        verbose: Option<bool>,
    ) -> Result<Self, ConfigError> {
        let mut figment = Self::figment(path);

        if let Some(t) = transport {
            figment = figment.merge(("forwarder.transport", t));
        }
        if let Some(v) = verbose {
            figment = figment.merge(("cli.verbose", v));
        }

        let config: CliAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::FileSystem(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path.as_ref(), toml_string)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forwarder
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.input.read_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "Read buffer size must be greater than 0".to_string(),
            ));
        }

        if self.input.udp_bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid UDP bind address: {}",
                self.input.udp_bind
            )));
        }

        if self.ble.connection_timeout.is_zero() || self.spp.connect_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Connect timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration written by `mavbt config`
    pub fn example() -> Self {
        CliAppConfig {
            forwarder: ForwarderConfig::default()
                .with_transport(TransportPolicy::Ble)
                .with_phase_timeout(Some(Duration::from_secs(10))),
            spp: SppConfig::default().with_channel(1),
            ..Default::default()
        }
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::example())
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = CliAppConfig::default();
        assert!(!config.cli.verbose);
        assert_eq!(config.forwarder.transport, TransportPolicy::Auto);
        assert_eq!(config.input.udp_bind, "127.0.0.1:14550");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = CliAppConfig::default();

        let mut invalid_config = config.clone();
        invalid_config.input.udp_bind = "not-an-address".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.forwarder.scan_timeout = Duration::ZERO;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.input.read_buffer_size = 0;
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_file_and_override_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [forwarder]
                transport = "spp"
                scan_timeout = 4.5

                [input]
                udp_bind = "0.0.0.0:14551"
                "#,
            )?;
            jail.set_env("MAVBT_CLI__VERBOSE", "true");

            let config = CliAppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.forwarder.transport, TransportPolicy::Spp);
            assert_eq!(config.forwarder.scan_timeout, Duration::from_millis(4500));
            assert_eq!(config.input.udp_bind, "0.0.0.0:14551");
            assert!(config.cli.verbose);

            let config =
                CliAppConfig::load_with_overrides(None, Some(TransportPolicy::Ble), Some(false))
                    .map_err(|e| e.to_string())?;
            assert_eq!(config.forwarder.transport, TransportPolicy::Ble);
            assert!(!config.cli.verbose);
            Ok(())
        });
    }

    #[test]
    fn test_example_config_generation() {
        let example = CliAppConfig::example_config();
        assert!(example.contains("[forwarder]"));
        assert!(example.contains("[spp]"));
        assert!(example.contains("[input]"));
    }
}
