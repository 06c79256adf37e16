//! SPP adapter configuration

use std::time::Duration;

use mavlink_bt_core::SPP_UUID;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the serial port profile connector
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SppConfig {
    /// Service class the client profile connects to
    pub service_uuid: Uuid,
    /// Fixed RFCOMM channel. When unset the channel is resolved through
    /// service discovery on the remote device.
    pub channel: Option<u8>,
    /// Maximum time to wait for the stream to open
    pub connect_timeout: Duration,
}

impl Default for SppConfig {
    fn default() -> Self {
        Self {
            service_uuid: SPP_UUID,
            channel: None,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl SppConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect straight to an RFCOMM channel, skipping service discovery
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_serial_port_profile() {
        let config = SppConfig::default();
        assert_eq!(
            config.service_uuid.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        assert!(config.channel.is_none());
    }

    #[test]
    fn test_fixed_channel() {
        let config = SppConfig::new().with_channel(1);
        assert_eq!(config.channel, Some(1));
    }
}
