//! Translation between btleplug types and the forwarder's transport events

use btleplug::api::{CentralState, CharPropFlags, Characteristic, Service};
use mavlink_bt_core::{GattCharacteristic, GattService, LinkError, TransportEvent};
use uuid::Uuid;

use crate::error::BleAdapterError;

// ----------------------------------------------------------------------------
// Scan Failure Codes
// ----------------------------------------------------------------------------

/// Internal stack error
pub const SCAN_FAILED_INTERNAL_ERROR: i32 = 3;

/// The adapter cannot perform the requested scan
pub const SCAN_FAILED_FEATURE_UNSUPPORTED: i32 = 4;

/// Event reported when the platform scan could not run
pub fn scan_failure(err: &btleplug::Error) -> TransportEvent {
    match err {
        btleplug::Error::PermissionDenied => {
            TransportEvent::ConnectionError(LinkError::PermissionDenied)
        }
        btleplug::Error::NotSupported(_) => TransportEvent::ScanFailed {
            code: SCAN_FAILED_FEATURE_UNSUPPORTED,
        },
        _ => TransportEvent::ScanFailed {
            code: SCAN_FAILED_INTERNAL_ERROR,
        },
    }
}

/// Event reported when the adapter is switched off. An unknown state is
/// treated as usable since not every platform reports one.
pub fn adapter_state_failure(state: CentralState) -> Option<TransportEvent> {
    match state {
        CentralState::PoweredOff => Some(TransportEvent::ConnectionError(
            LinkError::TransportUnavailable("Bluetooth adapter is powered off".to_string()),
        )),
        _ => None,
    }
}

/// Event reported when the GATT connection could not be established
pub fn connection_failure(err: BleAdapterError) -> TransportEvent {
    TransportEvent::ConnectionError(err.into())
}

// ----------------------------------------------------------------------------
// GATT Profile
// ----------------------------------------------------------------------------

pub fn gatt_characteristic(uuid: Uuid, properties: CharPropFlags) -> GattCharacteristic {
    GattCharacteristic {
        uuid,
        write_without_response: properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
    }
}

pub fn gatt_service(service: &Service) -> GattService {
    GattService {
        uuid: service.uuid,
        characteristics: service
            .characteristics
            .iter()
            .map(|c| gatt_characteristic(c.uuid, c.properties))
            .collect(),
    }
}

/// Find a characteristic of `service_uuid` among everything discovered
pub fn find_characteristic<'a>(
    services: impl IntoIterator<Item = &'a Service>,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
) -> Option<Characteristic> {
    services
        .into_iter()
        .filter(|s| s.uuid == service_uuid)
        .flat_map(|s| s.characteristics.iter())
        .find(|c| c.uuid == characteristic_uuid)
        .cloned()
}

// ----------------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------------

/// Whether a peripheral identified by `address` or platform `id` is the target.
/// Platforms without MAC addresses expose only the id.
pub fn is_target(address: &str, id: &str, target: &str) -> bool {
    address.eq_ignore_ascii_case(target) || id.eq_ignore_ascii_case(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink_bt_core::NUS_RX_CHARACTERISTIC_UUID;

    #[test]
    fn test_no_response_property_is_detected() {
        let rx = gatt_characteristic(
            NUS_RX_CHARACTERISTIC_UUID,
            CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE,
        );
        assert!(rx.write_without_response);

        let rx = gatt_characteristic(NUS_RX_CHARACTERISTIC_UUID, CharPropFlags::WRITE);
        assert!(!rx.write_without_response);
    }

    #[test]
    fn test_scan_failure_codes() {
        assert_eq!(
            scan_failure(&btleplug::Error::NotSupported("passive scan".into())),
            TransportEvent::ScanFailed {
                code: SCAN_FAILED_FEATURE_UNSUPPORTED
            }
        );
        assert_eq!(
            scan_failure(&btleplug::Error::RuntimeError("dbus".into())),
            TransportEvent::ScanFailed {
                code: SCAN_FAILED_INTERNAL_ERROR
            }
        );
        assert_eq!(
            scan_failure(&btleplug::Error::PermissionDenied),
            TransportEvent::ConnectionError(LinkError::PermissionDenied)
        );
    }

    #[test]
    fn test_powered_off_adapter_is_unavailable() {
        assert_eq!(
            adapter_state_failure(CentralState::PoweredOff),
            Some(TransportEvent::ConnectionError(
                LinkError::TransportUnavailable("Bluetooth adapter is powered off".to_string())
            ))
        );
        assert_eq!(adapter_state_failure(CentralState::PoweredOn), None);
        assert_eq!(adapter_state_failure(CentralState::Unknown), None);
    }

    #[test]
    fn test_target_matching() {
        assert!(is_target("AA:BB:CC:DD:EE:FF", "hci0/dev_AA", "aa:bb:cc:dd:ee:ff"));
        assert!(is_target("00:00:00:00:00:00", "5F0C2A10", "5f0c2a10"));
        assert!(!is_target("AA:BB:CC:DD:EE:00", "x", "AA:BB:CC:DD:EE:FF"));
    }
}
