//! Forwarder configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::protocol::{MIN_BLE_PAYLOAD, REQUESTED_ATT_MTU};
use crate::transport::TransportKind;

// ----------------------------------------------------------------------------
// Transport Policy
// ----------------------------------------------------------------------------

/// Which transport a connect request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPolicy {
    /// Let the forwarder choose; currently always BLE
    #[default]
    Auto,
    /// Nordic UART Service over BLE
    Ble,
    /// Classic Bluetooth serial port profile
    Spp,
}

impl TransportPolicy {
    /// Transport selected for the next connection attempt
    pub fn resolve(self) -> TransportKind {
        match self {
            TransportPolicy::Auto | TransportPolicy::Ble => TransportKind::Ble,
            TransportPolicy::Spp => TransportKind::Spp,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the link forwarder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Transport selection policy
    pub transport: TransportPolicy,
    /// Deadline for finding the target during an address-filtered scan
    #[serde(with = "duration_secs")]
    pub scan_timeout: Duration,
    /// ATT MTU requested after service discovery
    pub requested_mtu: u16,
    /// Deadline for each of GATT connect, service discovery and MTU
    /// negotiation. `None` waits for the peripheral indefinitely.
    #[serde(with = "option_duration_secs")]
    pub phase_timeout: Option<Duration>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            transport: TransportPolicy::Auto,
            scan_timeout: Duration::from_secs(8),
            requested_mtu: REQUESTED_ATT_MTU,
            phase_timeout: None,
        }
    }
}

impl ForwarderConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set transport policy
    pub fn with_transport(mut self, transport: TransportPolicy) -> Self {
        self.transport = transport;
        self
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the ATT MTU requested from the peripheral
    pub fn with_requested_mtu(mut self, mtu: u16) -> Self {
        self.requested_mtu = mtu;
        self
    }

    /// Bound the connect, discovery and MTU phases
    pub fn with_phase_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.phase_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_timeout.is_zero() {
            return Err(LinkError::Configuration(
                "scan timeout must be greater than 0".to_string(),
            ));
        }
        if (self.requested_mtu as usize) < MIN_BLE_PAYLOAD + 3 {
            return Err(LinkError::Configuration(format!(
                "requested MTU {} is below the BLE minimum of {}",
                self.requested_mtu,
                MIN_BLE_PAYLOAD + 3
            )));
        }
        if self.phase_timeout.is_some_and(|t| t.is_zero()) {
            return Err(LinkError::Configuration(
                "phase timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod option_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
