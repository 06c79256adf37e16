//! Error types for the link forwarder

use thiserror::Error;

use crate::link::LinkPhase;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Everything that can end a link or a connection attempt.
///
/// None of these cross the command surface. The worker recovers by returning
/// to idle and reports the error's display text through the event sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Target address is empty")]
    AddressInvalid,

    #[error("Bluetooth transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("BLE scanner unavailable")]
    ScanUnavailable,

    #[error("BLE scan failed: {0}")]
    ScanError(i32),

    #[error("Missing Bluetooth permission")]
    PermissionDenied,

    #[error("BLE scan timed out")]
    ScanTimeout,

    #[error("NUS service not found")]
    ServiceNotFound,

    #[error("NUS RX characteristic not found")]
    CharacteristicNotFound,

    #[error("Transport fault: {0}")]
    TransportFault(String),

    #[error("Write failed")]
    WriteFailed,

    #[error("Timed out while {0}")]
    PhaseTimeout(LinkPhase),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for forwarder operations
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_adapter_detail() {
        assert_eq!(LinkError::ScanError(3).to_string(), "BLE scan failed: 3");
        assert_eq!(
            LinkError::TransportFault("socket closed".into()).to_string(),
            "Transport fault: socket closed"
        );
        assert_eq!(
            LinkError::PhaseTimeout(LinkPhase::DiscoveringServices).to_string(),
            "Timed out while discovering services"
        );
    }
}
