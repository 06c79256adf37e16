//! btleplug adapter configuration

use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug central
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleAdapterConfig {
    /// Index into the host's adapter list
    pub adapter_index: usize,
    /// Maximum time to wait for the platform connect call
    pub connection_timeout: Duration,
}

impl Default for BleAdapterConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl BleAdapterConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a host adapter other than the first
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}
