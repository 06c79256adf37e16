//! Link application driving one forwarder from the command line

use std::time::Duration;

use mavlink_bt_ble::BtleplugCentral;
use mavlink_bt_core::{EventReceiver, Forwarder, LinkEvent, LinkPhase};
use mavlink_bt_spp::BluezSppConnector;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CliAppConfig;
use crate::error::{CliError, Result};
use crate::input::FrameSource;

/// Poll interval while waiting for queued fragments after input closes
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Owns the forwarder, its event stream and the worker task
pub struct LinkApp {
    config: CliAppConfig,
    forwarder: Forwarder,
    events: EventReceiver,
    worker: JoinHandle<()>,
}

impl LinkApp {
    /// Open the host adapters and spawn the forwarder worker
    pub async fn new(config: CliAppConfig) -> Result<Self> {
        let central = match BtleplugCentral::initialize(config.ble.clone()).await {
            Ok(central) => central,
            Err(e) => {
                warn!("BLE unavailable, scans will fail: {}", e);
                BtleplugCentral::unavailable(config.ble.clone())
            }
        };
        let spp = BluezSppConnector::new(config.spp.clone());

        let (forwarder, events, worker) = Forwarder::spawn_with_channel(
            config.forwarder.clone(),
            Box::new(central),
            Box::new(spp),
        )?;

        Ok(Self {
            config,
            forwarder,
            events,
            worker,
        })
    }

    /// Connect to `address` and forward `source` until the link ends, the
    /// input closes or the user interrupts
    pub async fn run(mut self, address: &str, source: FrameSource) -> Result<()> {
        info!(
            "Connecting to {} ({:?} transport)",
            address, self.config.forwarder.transport
        );
        self.forwarder.connect(address);

        let outcome = match self.wait_for_link().await {
            Ok(true) => self.forward(source).await,
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };

        self.shutdown().await;
        outcome
    }

    /// Wait for the first lifecycle event. `Ok(false)` means interrupted.
    async fn wait_for_link(&mut self) -> Result<bool> {
        tokio::select! {
            event = self.events.recv() => match event {
                Some(LinkEvent::Connected { address, name, is_ble }) => {
                    info!("Link ready: {} ({}) over {}", name, address, transport_name(is_ble));
                    Ok(true)
                }
                Some(LinkEvent::ConnectionFailed { message, .. })
                | Some(LinkEvent::Disconnected { message, .. }) => {
                    error!("Connection failed: {}", message);
                    Err(CliError::LinkEnded(message))
                }
                None => Err(CliError::LinkEnded("forwarder stopped".to_string())),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted before the link was ready");
                Ok(false)
            }
        }
    }

    async fn forward(&mut self, source: FrameSource) -> Result<()> {
        let sink = self.forwarder.clone();
        let buffer_size = self.config.input.read_buffer_size;
        let mut pump = tokio::spawn(async move { source.pump(&sink, buffer_size).await });

        let outcome = loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(LinkEvent::Disconnected { message, .. })
                    | Some(LinkEvent::ConnectionFailed { message, .. }) => {
                        warn!("Link lost: {}", message);
                        break Err(CliError::LinkEnded(message));
                    }
                    Some(event) => debug!("Ignoring {:?}", event),
                    None => break Err(CliError::LinkEnded("forwarder stopped".to_string())),
                },
                result = &mut pump => {
                    break match result {
                        Ok(Ok(bytes)) => {
                            info!("Input closed after {} bytes, flushing link", bytes);
                            self.wait_for_drain().await;
                            Ok(())
                        }
                        Ok(Err(e)) => Err(e.into()),
                        Err(e) => Err(CliError::Input(e.to_string())),
                    };
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, releasing link");
                    break Ok(());
                }
            }
        };

        pump.abort();
        outcome
    }

    /// Wait until the ready link has no queued or in-flight fragments
    async fn wait_for_drain(&self) {
        while let Some(snapshot) = self.forwarder.snapshot().await {
            let pending = snapshot.write_in_flight || snapshot.queued_fragments > 0;
            if snapshot.phase != LinkPhase::Ready || !pending {
                return;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }

    async fn shutdown(self) {
        self.forwarder.release();
        if let Err(e) = self.worker.await {
            debug!("Forwarder worker ended abnormally: {}", e);
        }
    }
}

fn transport_name(is_ble: bool) -> &'static str {
    if is_ble {
        "BLE"
    } else {
        "SPP"
    }
}
