//! Connector behavior that does not need a Bluetooth controller

use mavlink_bt_core::{LinkError, SppConnector};
use mavlink_bt_spp::{BluezSppConnector, SppConfig};

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_malformed_address_is_rejected_before_bluez() {
    let mut connector = BluezSppConnector::new(SppConfig::default());

    let err = match connector.connect("not-an-address").await {
        Ok(_) => panic!("connect to a malformed address succeeded"),
        Err(e) => e,
    };
    assert_eq!(
        err,
        LinkError::TransportFault("Invalid Bluetooth address: not-an-address".to_string())
    );
}

#[cfg(not(target_os = "linux"))]
#[tokio::test]
async fn test_connector_reports_unsupported_platform() {
    let mut connector = BluezSppConnector::new(SppConfig::default());

    assert!(matches!(
        connector.connect("AA:BB:CC:DD:EE:FF").await,
        Err(LinkError::TransportUnavailable(_))
    ));
}
