//! GATT connection driver and fragment writes

use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use mavlink_bt_core::{
    Fragment, GattClient, LinkError, Result, TransportEvent, TransportEventSender,
    NUS_RX_CHARACTERISTIC_UUID, NUS_SERVICE_UUID,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::central::peripheral_is_target;
use crate::error::BleAdapterError;
use crate::protocol::{connection_failure, find_characteristic, gatt_service};

// ----------------------------------------------------------------------------
// GATT Client
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum GattOp {
    DiscoverServices,
    Write(Fragment),
    Close,
}

/// Handle to one GATT connection driven by a background task.
///
/// Each call is queued for the driver and returns at once; outcomes are
/// posted back to the forwarder as transport events.
pub struct BtleplugGattClient {
    ops: mpsc::UnboundedSender<GattOp>,
}

impl BtleplugGattClient {
    pub(crate) fn spawn(
        adapter: Adapter,
        address: String,
        connection_timeout: Duration,
        events: TransportEventSender,
    ) -> Self {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let driver = GattDriver {
            adapter,
            address,
            events,
            ops: ops_rx,
        };
        tokio::spawn(driver.run(connection_timeout));
        Self { ops: ops_tx }
    }

    fn queue(&self, op: GattOp) -> bool {
        self.ops.send(op).is_ok()
    }
}

impl GattClient for BtleplugGattClient {
    fn discover_services(&mut self) -> Result<()> {
        if self.queue(GattOp::DiscoverServices) {
            Ok(())
        } else {
            Err(LinkError::from(BleAdapterError::ConnectionClosed))
        }
    }

    fn request_mtu(&mut self, mtu: u16) -> bool {
        // btleplug negotiates the ATT MTU itself and exposes no request
        debug!("MTU request for {} not supported by btleplug", mtu);
        false
    }

    fn write(&mut self, fragment: Fragment) -> bool {
        self.queue(GattOp::Write(fragment))
    }

    fn close(&mut self) {
        let _ = self.queue(GattOp::Close);
    }
}

impl Drop for BtleplugGattClient {
    fn drop(&mut self) {
        let _ = self.queue(GattOp::Close);
    }
}

// ----------------------------------------------------------------------------
// Connection Driver
// ----------------------------------------------------------------------------

struct GattDriver {
    adapter: Adapter,
    address: String,
    events: TransportEventSender,
    ops: mpsc::UnboundedReceiver<GattOp>,
}

/// Outcome of a single driver step
enum Step {
    Continue,
    Close,
    Lost,
}

impl GattDriver {
    async fn run(mut self, connection_timeout: Duration) {
        let peripheral = match self.connect(connection_timeout).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.address, e);
                self.events.post(connection_failure(e));
                return;
            }
        };

        let mut central_events = match self.adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                self.events.post(connection_failure(BleAdapterError::Btleplug(e)));
                let _ = peripheral.disconnect().await;
                return;
            }
        };

        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        info!("Connected to peripheral: {}", self.address);
        self.events.post(TransportEvent::ConnectionStateChanged {
            connected: true,
            name,
        });

        let peripheral_id = peripheral.id();
        let mut rx: Option<Characteristic> = None;

        loop {
            let step = tokio::select! {
                op = self.ops.recv() => match op {
                    Some(op) => self.handle_op(&peripheral, &mut rx, op).await,
                    None => Step::Close,
                },
                event = central_events.next() => match event {
                    Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => Step::Lost,
                    Some(_) => Step::Continue,
                    None => {
                        self.events.post(connection_failure(BleAdapterError::ConnectionClosed));
                        Step::Close
                    }
                },
            };

            match step {
                Step::Continue => {}
                Step::Close => break,
                Step::Lost => {
                    info!("Peripheral {} disconnected", self.address);
                    self.events.post(TransportEvent::ConnectionStateChanged {
                        connected: false,
                        name: None,
                    });
                    return;
                }
            }
        }

        if let Err(e) = peripheral.disconnect().await {
            debug!("Failed to disconnect from {}: {}", self.address, e);
        }
        debug!("GATT driver for {} stopped", self.address);
    }

    async fn connect(
        &self,
        connection_timeout: Duration,
    ) -> std::result::Result<Peripheral, BleAdapterError> {
        let peripheral = self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| peripheral_is_target(p, &self.address))
            .ok_or_else(|| BleAdapterError::PeripheralNotFound {
                address: self.address.clone(),
            })?;

        timeout(connection_timeout, peripheral.connect())
            .await
            .map_err(|_| BleAdapterError::ConnectionTimeout)??;
        Ok(peripheral)
    }

    async fn handle_op(
        &self,
        peripheral: &Peripheral,
        rx: &mut Option<Characteristic>,
        op: GattOp,
    ) -> Step {
        match op {
            GattOp::DiscoverServices => {
                if let Err(e) = peripheral.discover_services().await {
                    error!("Failed to discover services for {}: {}", self.address, e);
                    self.events.post(TransportEvent::ServiceDiscoveryFailed(
                        BleAdapterError::Btleplug(e).into(),
                    ));
                    return Step::Continue;
                }
                let services = peripheral.services();
                *rx = find_characteristic(&services, NUS_SERVICE_UUID, NUS_RX_CHARACTERISTIC_UUID);
                self.events.post(TransportEvent::ServicesDiscovered(
                    services.iter().map(gatt_service).collect(),
                ));
                Step::Continue
            }
            GattOp::Write(fragment) => {
                let success = match rx.as_ref() {
                    Some(characteristic) => {
                        write_fragment(peripheral, characteristic, &fragment).await
                    }
                    None => false,
                };
                self.events.post(TransportEvent::WriteCompleted {
                    characteristic: NUS_RX_CHARACTERISTIC_UUID,
                    success,
                });
                Step::Continue
            }
            GattOp::Close => Step::Close,
        }
    }
}

async fn write_fragment(
    peripheral: &Peripheral,
    characteristic: &Characteristic,
    fragment: &Fragment,
) -> bool {
    let write_type = if characteristic
        .properties
        .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
    {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    };

    match peripheral
        .write(characteristic, fragment.as_bytes(), write_type)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to write to characteristic: {}", e);
            false
        }
    }
}
