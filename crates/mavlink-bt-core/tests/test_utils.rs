//! Mock transport adapters for driving the forwarder deterministically
//!
//! The mocks record every capability call and keep the most recent
//! [`TransportEventSender`] so tests can play the peripheral's side of the
//! exchange one event at a time.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mavlink_bt_core::{
    BleCentral, EventReceiver, Forwarder, Fragment, GattCharacteristic, GattClient, GattService,
    LinkError, LinkEvent, LinkSnapshot, Result, SppConnector, SppSocket, TransportEvent,
    TransportEventSender, NUS_RX_CHARACTERISTIC_UUID, NUS_SERVICE_UUID,
    NUS_TX_CHARACTERISTIC_UUID,
};
use uuid::Uuid;

pub const TARGET: &str = "AA:BB:CC:DD:EE:FF";
pub const PERIPHERAL_NAME: &str = "SkyLink";

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// A capability call made by the forwarder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartScan(String),
    StopScan,
    ConnectGatt(String),
    DiscoverServices,
    RequestMtu(u16),
    Write(Vec<u8>),
    CloseGatt,
    SppConnect(String),
    SppWrite(Vec<u8>),
    SppClose,
}

/// Knobs controlling how the mocks answer
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub scan_available: bool,
    pub gatt_connect: std::result::Result<(), LinkError>,
    pub mtu_request_accepted: bool,
    pub writes_initiate: bool,
    pub spp_connect: std::result::Result<Option<String>, LinkError>,
    pub spp_write: std::result::Result<(), LinkError>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            scan_available: true,
            gatt_connect: Ok(()),
            mtu_request_accepted: true,
            writes_initiate: true,
            spp_connect: Ok(Some(PERIPHERAL_NAME.to_string())),
            spp_write: Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<Call>,
    behavior: MockBehavior,
    events: Option<TransportEventSender>,
}

// ----------------------------------------------------------------------------
// Mock Bluetooth Stack
// ----------------------------------------------------------------------------

/// Shared recorder behind every mock adapter handed to one forwarder
#[derive(Debug, Clone, Default)]
pub struct MockBluetooth {
    shared: Arc<Mutex<Shared>>,
}

impl MockBluetooth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let mock = Self::default();
        mock.shared.lock().unwrap().behavior = behavior;
        mock
    }

    pub fn central(&self) -> Box<dyn BleCentral> {
        Box::new(MockCentral {
            shared: self.shared.clone(),
        })
    }

    pub fn spp(&self) -> Box<dyn SppConnector> {
        Box::new(MockSppConnector {
            shared: self.shared.clone(),
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut MockBehavior)) {
        f(&mut self.shared.lock().unwrap().behavior);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Payloads of every BLE write, in dispatch order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn spp_writes(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SppWrite(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// Sender handed out with the latest scan or GATT connection
    pub fn sender(&self) -> TransportEventSender {
        self.shared
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("no transport events sender handed out yet")
    }

    /// Post an event as the current peripheral
    pub fn post(&self, event: TransportEvent) {
        assert!(self.sender().post(event), "forwarder stopped");
    }

    fn record(&self, call: Call) {
        self.shared.lock().unwrap().calls.push(call);
    }
}

struct MockCentral {
    shared: Arc<Mutex<Shared>>,
}

impl BleCentral for MockCentral {
    fn start_scan(&mut self, address: &str, events: TransportEventSender) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::StartScan(address.to_string()));
        if !shared.behavior.scan_available {
            return Err(LinkError::ScanUnavailable);
        }
        shared.events = Some(events);
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.shared.lock().unwrap().calls.push(Call::StopScan);
    }

    fn connect_gatt(
        &mut self,
        address: &str,
        events: TransportEventSender,
    ) -> Result<Box<dyn GattClient>> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::ConnectGatt(address.to_string()));
        shared.behavior.gatt_connect.clone()?;
        shared.events = Some(events);
        Ok(Box::new(MockGattClient {
            shared: self.shared.clone(),
        }))
    }
}

struct MockGattClient {
    shared: Arc<Mutex<Shared>>,
}

impl GattClient for MockGattClient {
    fn discover_services(&mut self) -> Result<()> {
        self.shared
            .lock()
            .unwrap()
            .calls
            .push(Call::DiscoverServices);
        Ok(())
    }

    fn request_mtu(&mut self, mtu: u16) -> bool {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::RequestMtu(mtu));
        shared.behavior.mtu_request_accepted
    }

    fn write(&mut self, fragment: Fragment) -> bool {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::Write(fragment.into_vec()));
        shared.behavior.writes_initiate
    }

    fn close(&mut self) {
        self.shared.lock().unwrap().calls.push(Call::CloseGatt);
    }
}

struct MockSppConnector {
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl SppConnector for MockSppConnector {
    async fn connect(&mut self, address: &str) -> Result<(Box<dyn SppSocket>, Option<String>)> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::SppConnect(address.to_string()));
        let name = shared.behavior.spp_connect.clone()?;
        let socket = MockSppSocket {
            shared: self.shared.clone(),
        };
        Ok((Box::new(socket), name))
    }
}

struct MockSppSocket {
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl SppSocket for MockSppSocket {
    async fn write_all(&mut self, buffer: &[u8]) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(Call::SppWrite(buffer.to_vec()));
        shared.behavior.spp_write.clone()
    }

    async fn close(&mut self) {
        self.shared.lock().unwrap().calls.push(Call::SppClose);
    }
}

// ----------------------------------------------------------------------------
// Peripheral Scripts
// ----------------------------------------------------------------------------

/// Services exposed by a NUS peripheral
pub fn nus_services(write_without_response: bool) -> Vec<GattService> {
    vec![
        GattService {
            uuid: Uuid::from_u128(0x0000180A_0000_1000_8000_00805F9B34FB),
            characteristics: vec![],
        },
        GattService {
            uuid: NUS_SERVICE_UUID,
            characteristics: vec![
                GattCharacteristic {
                    uuid: NUS_RX_CHARACTERISTIC_UUID,
                    write_without_response,
                },
                GattCharacteristic {
                    uuid: NUS_TX_CHARACTERISTIC_UUID,
                    write_without_response: false,
                },
            ],
        },
    ]
}

/// Wait until the worker has handled everything posted so far
pub async fn settle(forwarder: &Forwarder) -> LinkSnapshot {
    forwarder
        .snapshot()
        .await
        .expect("forwarder worker stopped")
}

/// Drain every event emitted so far
pub fn drain(events: &mut EventReceiver) -> Vec<LinkEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Drive a BLE attempt from scan match through service discovery
pub async fn drive_to_discovery(mock: &MockBluetooth, forwarder: &Forwarder) {
    forwarder.connect(TARGET);
    settle(forwarder).await;
    mock.post(TransportEvent::ScanMatched {
        address: TARGET.to_string(),
    });
    settle(forwarder).await;
    mock.post(TransportEvent::ConnectionStateChanged {
        connected: true,
        name: Some(PERIPHERAL_NAME.to_string()),
    });
    settle(forwarder).await;
}

/// Drive a BLE attempt all the way to ready with `granted` ATT MTU
pub async fn drive_to_ready(mock: &MockBluetooth, forwarder: &Forwarder, granted: u16) {
    drive_to_discovery(mock, forwarder).await;
    mock.post(TransportEvent::ServicesDiscovered(nus_services(true)));
    settle(forwarder).await;
    mock.post(TransportEvent::MtuChanged {
        mtu: granted,
        success: true,
    });
    settle(forwarder).await;
}

/// Acknowledge the in-flight write
pub fn complete_write(mock: &MockBluetooth, success: bool) {
    mock.post(TransportEvent::WriteCompleted {
        characteristic: NUS_RX_CHARACTERISTIC_UUID,
        success,
    });
}
