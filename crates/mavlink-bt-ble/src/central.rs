//! Address-filtered scanning with btleplug

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use mavlink_bt_core::{
    BleCentral, GattClient, LinkError, Result, TransportEvent, TransportEventSender,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BleAdapterConfig;
use crate::connection::BtleplugGattClient;
use crate::error::BleAdapterError;
use crate::protocol::{adapter_state_failure, is_target, scan_failure};

// ----------------------------------------------------------------------------
// Central Implementation
// ----------------------------------------------------------------------------

/// BLE central backed by the host's btleplug adapter
pub struct BtleplugCentral {
    config: BleAdapterConfig,
    adapter: Option<Adapter>,
    scan: Option<JoinHandle<()>>,
    /// Outstanding adapter stop; the next scan waits for it
    stopping: Option<JoinHandle<()>>,
}

impl BtleplugCentral {
    /// Open the configured host adapter
    pub async fn initialize(
        config: BleAdapterConfig,
    ) -> std::result::Result<Self, BleAdapterError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleAdapterError::AdapterNotAvailable)?;

        match adapter.adapter_info().await {
            Ok(info) => info!("BLE adapter initialized: {}", info),
            Err(e) => debug!("BLE adapter initialized, info unavailable: {}", e),
        }

        Ok(Self {
            config,
            adapter: Some(adapter),
            scan: None,
            stopping: None,
        })
    }

    /// A central with no adapter; every scan fails as unavailable
    pub fn unavailable(config: BleAdapterConfig) -> Self {
        Self {
            config,
            adapter: None,
            scan: None,
            stopping: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.adapter.is_some()
    }
}

impl BleCentral for BtleplugCentral {
    fn start_scan(&mut self, address: &str, events: TransportEventSender) -> Result<()> {
        let adapter = self.adapter.clone().ok_or(LinkError::ScanUnavailable)?;
        self.stop_scan();

        let previous_stop = self.stopping.take();
        self.scan = Some(tokio::spawn(run_scan(
            adapter,
            address.to_string(),
            events,
            previous_stop,
        )));
        Ok(())
    }

    fn stop_scan(&mut self) {
        let Some(scan) = self.scan.take() else {
            return;
        };
        scan.abort();

        if let Some(adapter) = self.adapter.clone() {
            self.stopping = Some(tokio::spawn(async move {
                if let Err(e) = adapter.stop_scan().await {
                    debug!("Failed to stop BLE scan: {}", e);
                }
            }));
        }
    }

    fn connect_gatt(
        &mut self,
        address: &str,
        events: TransportEventSender,
    ) -> Result<Box<dyn GattClient>> {
        let adapter = self
            .adapter
            .clone()
            .ok_or(BleAdapterError::AdapterNotAvailable)?;
        let client = BtleplugGattClient::spawn(
            adapter,
            address.to_string(),
            self.config.connection_timeout,
            events,
        );
        Ok(Box::new(client))
    }
}

impl Drop for BtleplugCentral {
    fn drop(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Scan Task
// ----------------------------------------------------------------------------

async fn run_scan(
    adapter: Adapter,
    target: String,
    events: TransportEventSender,
    previous_stop: Option<JoinHandle<()>>,
) {
    if let Some(stop) = previous_stop {
        let _ = stop.await;
    }

    match adapter.adapter_state().await {
        Ok(state) => {
            if let Some(failure) = adapter_state_failure(state) {
                warn!("BLE adapter is powered off");
                events.post(failure);
                return;
            }
        }
        Err(e) => debug!("BLE adapter state unavailable: {}", e),
    }

    let mut central_events = match adapter.events().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to get BLE events: {}", e);
            events.post(scan_failure(&e));
            return;
        }
    };

    if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
        warn!("Failed to start BLE scan: {}", e);
        events.post(scan_failure(&e));
        return;
    }
    debug!("Scanning for {}", target);

    // the target may already be cached by the stack
    if let Ok(peripherals) = adapter.peripherals().await {
        for peripheral in &peripherals {
            if peripheral_is_target(peripheral, &target) {
                events.post(TransportEvent::ScanMatched { address: target });
                return;
            }
        }
    }

    while let Some(event) = central_events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let Ok(peripheral) = adapter.peripheral(&id).await else {
            continue;
        };
        if peripheral_is_target(&peripheral, &target) {
            events.post(TransportEvent::ScanMatched { address: target });
            return;
        }
    }

    debug!("BLE event stream ended while scanning");
}

pub(crate) fn peripheral_is_target(peripheral: &Peripheral, target: &str) -> bool {
    is_target(
        &peripheral.address().to_string(),
        &format!("{:?}", peripheral.id()),
        target,
    )
}
