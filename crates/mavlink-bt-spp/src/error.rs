//! Error types for the SPP adapter

use mavlink_bt_core::LinkError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised while opening or writing an RFCOMM stream
#[derive(Error, Debug)]
pub enum SppAdapterError {
    #[error("Invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("SPP profile closed before the connection arrived")]
    ProfileClosed,

    #[error("SPP is not supported on this platform")]
    Unsupported,

    #[cfg(target_os = "linux")]
    #[error("BlueZ error: {0}")]
    Bluez(#[from] bluer::Error),

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SppAdapterError> for LinkError {
    fn from(err: SppAdapterError) -> Self {
        match err {
            SppAdapterError::Unsupported => {
                LinkError::TransportUnavailable("SPP not supported".to_string())
            }
            SppAdapterError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                LinkError::PermissionDenied
            }
            #[cfg(target_os = "linux")]
            SppAdapterError::Bluez(e)
                if matches!(
                    e.kind,
                    bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted
                ) =>
            {
                LinkError::PermissionDenied
            }
            other => LinkError::TransportFault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_socket_permission_error_maps_to_permission_denied() {
        let err = SppAdapterError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(LinkError::from(err), LinkError::PermissionDenied);
    }

    #[test]
    fn test_broken_socket_becomes_transport_fault() {
        let err = SppAdapterError::from(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"));
        assert_eq!(
            LinkError::from(err),
            LinkError::TransportFault("Socket error: Broken pipe".to_string())
        );
    }

    #[test]
    fn test_unsupported_platform_is_unavailable() {
        assert!(matches!(
            LinkError::from(SppAdapterError::Unsupported),
            LinkError::TransportUnavailable(_)
        ));
    }
}
