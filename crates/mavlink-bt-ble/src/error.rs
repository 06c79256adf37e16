//! Error types for the btleplug adapter

use mavlink_bt_core::LinkError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while driving the platform BLE stack
#[derive(Error, Debug)]
pub enum BleAdapterError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Peripheral not found: {address}")]
    PeripheralNotFound { address: String },

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("GATT connection closed")]
    ConnectionClosed,

    #[error("BLE error: {0}")]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleAdapterError> for LinkError {
    fn from(err: BleAdapterError) -> Self {
        match err {
            BleAdapterError::Btleplug(btleplug::Error::PermissionDenied) => {
                LinkError::PermissionDenied
            }
            BleAdapterError::AdapterNotAvailable => {
                LinkError::TransportUnavailable("no BLE adapter".to_string())
            }
            other => LinkError::TransportFault(other.to_string()),
        }
    }
}
