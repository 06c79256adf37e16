//! Forwarder behavior on hosts without a usable BLE adapter

use mavlink_bt_ble::{BleAdapterConfig, BtleplugCentral};
use mavlink_bt_core::{DisabledSpp, Forwarder, ForwarderConfig, LinkEvent, LinkPhase};

#[tokio::test]
async fn test_missing_adapter_reports_scanner_unavailable() {
    let central = BtleplugCentral::unavailable(BleAdapterConfig::default());
    assert!(!central.is_available());

    let (forwarder, mut events, _worker) = Forwarder::spawn_with_channel(
        ForwarderConfig::default(),
        Box::new(central),
        Box::new(DisabledSpp),
    )
    .unwrap();

    forwarder.connect("AA:BB:CC:DD:EE:FF");
    let snapshot = forwarder.snapshot().await.unwrap();

    assert_eq!(snapshot.phase, LinkPhase::Idle);
    assert_eq!(
        events.try_recv().unwrap(),
        LinkEvent::ConnectionFailed {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            message: "BLE scanner unavailable".to_string(),
            is_ble: true,
        }
    );
}

#[test]
fn test_adapter_config_builders() {
    let config = BleAdapterConfig::new()
        .with_adapter_index(1)
        .with_connection_timeout(std::time::Duration::from_secs(3));

    assert_eq!(config.adapter_index, 1);
    assert_eq!(config.connection_timeout.as_secs(), 3);
}
