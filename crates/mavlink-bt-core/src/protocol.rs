//! Nordic UART Service constants and MTU rules

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Nordic UART Service UUID
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// NUS characteristic the peripheral receives on; the forwarder writes here
pub const NUS_RX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// NUS characteristic the peripheral notifies on (not used for forwarding)
pub const NUS_TX_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

/// Serial Port Profile UUID
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

// ----------------------------------------------------------------------------
// MTU
// ----------------------------------------------------------------------------

/// ATT MTU requested once services are discovered
pub const REQUESTED_ATT_MTU: u16 = 185;

/// ATT header bytes subtracted from the granted MTU
pub const ATT_HEADER_SIZE: usize = 3;

/// Largest payload every BLE link accepts
pub const MIN_BLE_PAYLOAD: usize = 20;

/// Payload used when MTU negotiation is unavailable but the write
/// characteristic accepts write-without-response
pub const FALLBACK_NO_RESPONSE_PAYLOAD: usize = 182;

/// Largest payload accepted by one BLE write on the current link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mtu(usize);

impl Mtu {
    /// BLE minimum, used until negotiation completes
    pub const DEFAULT: Mtu = Mtu(MIN_BLE_PAYLOAD);

    /// Wrap an explicit payload size. Zero is raised to one byte.
    pub fn new(size: usize) -> Self {
        Self(size.max(1))
    }

    /// Payload size after the peripheral granted `att_mtu`
    pub fn from_granted(att_mtu: u16) -> Self {
        Self((att_mtu as usize).saturating_sub(ATT_HEADER_SIZE).max(MIN_BLE_PAYLOAD))
    }

    /// Payload size when the MTU request was rejected or is unsupported
    pub fn fallback(write_without_response: bool) -> Self {
        if write_without_response {
            Self(FALLBACK_NO_RESPONSE_PAYLOAD)
        } else {
            Self::DEFAULT
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Mtu {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Mtu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_mtu_subtracts_att_header() {
        assert_eq!(Mtu::from_granted(100).get(), 97);
        assert_eq!(Mtu::from_granted(REQUESTED_ATT_MTU).get(), 182);
    }

    #[test]
    fn test_granted_mtu_never_below_ble_minimum() {
        assert_eq!(Mtu::from_granted(23).get(), 20);
        assert_eq!(Mtu::from_granted(10).get(), 20);
        assert_eq!(Mtu::from_granted(0).get(), 20);
    }

    #[test]
    fn test_fallback_depends_on_write_type() {
        assert_eq!(Mtu::fallback(true).get(), 182);
        assert_eq!(Mtu::fallback(false).get(), 20);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(Mtu::new(0).get(), 1);
    }

    #[test]
    fn test_nus_uuid_strings() {
        assert_eq!(
            NUS_SERVICE_UUID.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(SPP_UUID.to_string(), "00001101-0000-1000-8000-00805f9b34fb");
    }
}
