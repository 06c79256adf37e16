//! Capability traits implemented by transport adapters
//!
//! The forwarder never talks to a Bluetooth stack directly. A BLE adapter
//! implements [`BleCentral`] and [`GattClient`]; an SPP adapter implements
//! [`SppConnector`] and [`SppSocket`].
//!
//! BLE operations are fire-and-report: a method starts the platform call and
//! returns at once, and the outcome arrives later as a [`TransportEvent`]
//! posted through the [`TransportEventSender`] the adapter was handed. The
//! sender re-posts onto the forwarder's inbox, so adapter callbacks never
//! touch link state from their own threads.
//!
//! SPP operations are plain async calls awaited on the forwarder worker.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use crate::chunking::Fragment;
use crate::error::{LinkError, Result};
use crate::forwarder::Inbox;

// ----------------------------------------------------------------------------
// Transport Kind
// ----------------------------------------------------------------------------

/// Transport carrying the active link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    Ble,
    Spp,
}

impl TransportKind {
    pub fn is_ble(self) -> bool {
        self == TransportKind::Ble
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ble => write!(f, "BLE"),
            TransportKind::Spp => write!(f, "SPP"),
        }
    }
}

// ----------------------------------------------------------------------------
// GATT Profile Description
// ----------------------------------------------------------------------------

/// A characteristic reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    /// Whether the characteristic accepts write-without-response
    pub write_without_response: bool,
}

/// A primary service reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Asynchronous outcome reported by a BLE adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The scan saw a peripheral with this address
    ScanMatched { address: String },
    /// The platform scan failed after it was started
    ScanFailed { code: i32 },
    /// GATT connection state changed without error
    ConnectionStateChanged {
        connected: bool,
        name: Option<String>,
    },
    /// GATT connection reported an error status
    ConnectionError(LinkError),
    /// Service discovery completed
    ServicesDiscovered(Vec<GattService>),
    /// Service discovery reported an error status
    ServiceDiscoveryFailed(LinkError),
    /// The MTU request completed
    MtuChanged { mtu: u16, success: bool },
    /// A characteristic write completed
    WriteCompleted { characteristic: Uuid, success: bool },
}

/// Posts adapter events onto the forwarder inbox, stamped with the
/// connection attempt they belong to
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    pub(crate) generation: u64,
    pub(crate) inbox: mpsc::UnboundedSender<Inbox>,
}

impl TransportEventSender {
    /// Post an event; returns false once the forwarder has shut down
    pub fn post(&self, event: TransportEvent) -> bool {
        let sent = self
            .inbox
            .send(Inbox::Transport {
                generation: self.generation,
                event,
            })
            .is_ok();
        if !sent {
            trace!("Forwarder stopped, transport event dropped");
        }
        sent
    }
}

// ----------------------------------------------------------------------------
// BLE Capabilities
// ----------------------------------------------------------------------------

/// Scanner and GATT connector for the BLE transport
pub trait BleCentral: Send + 'static {
    /// Begin a low-latency scan filtered to `address`.
    ///
    /// Matches are posted as [`TransportEvent::ScanMatched`], later failures
    /// as [`TransportEvent::ScanFailed`], and a switched-off adapter as a
    /// [`TransportEvent::ConnectionError`] carrying
    /// [`LinkError::TransportUnavailable`]. Returns
    /// [`LinkError::ScanUnavailable`] when no scanner exists.
    fn start_scan(&mut self, address: &str, events: TransportEventSender) -> Result<()>;

    /// Stop the current scan; a no-op when none is running
    fn stop_scan(&mut self);

    /// Open a GATT connection to a matched peripheral. The connection outcome
    /// arrives as [`TransportEvent::ConnectionStateChanged`] or
    /// [`TransportEvent::ConnectionError`].
    fn connect_gatt(
        &mut self,
        address: &str,
        events: TransportEventSender,
    ) -> Result<Box<dyn GattClient>>;
}

/// Handle to one GATT connection
pub trait GattClient: Send + 'static {
    /// Start service discovery; the result arrives as
    /// [`TransportEvent::ServicesDiscovered`]
    fn discover_services(&mut self) -> Result<()>;

    /// Request a larger ATT MTU. Returns false when the request was rejected
    /// or the platform cannot negotiate; otherwise the outcome arrives as
    /// [`TransportEvent::MtuChanged`].
    fn request_mtu(&mut self, mtu: u16) -> bool;

    /// Write one fragment to the NUS RX characteristic without response.
    /// Returns false when the write could not be initiated; otherwise the
    /// outcome arrives as [`TransportEvent::WriteCompleted`].
    fn write(&mut self, fragment: Fragment) -> bool;

    /// Disconnect and release the connection
    fn close(&mut self);
}

// ----------------------------------------------------------------------------
// SPP Capabilities
// ----------------------------------------------------------------------------

/// Opens serial-port-profile streams
#[async_trait]
pub trait SppConnector: Send + 'static {
    /// Connect to `address`, returning the open socket and the remote name
    /// when the stack knows it
    async fn connect(&mut self, address: &str) -> Result<(Box<dyn SppSocket>, Option<String>)>;
}

/// An open serial-port-profile stream
#[async_trait]
pub trait SppSocket: Send + 'static {
    /// Write the whole buffer and flush
    async fn write_all(&mut self, buffer: &[u8]) -> Result<()>;

    /// Shut the stream down; errors are ignored
    async fn close(&mut self);
}

/// SPP connector used when the classic transport is administratively disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSpp;

#[async_trait]
impl SppConnector for DisabledSpp {
    async fn connect(&mut self, _address: &str) -> Result<(Box<dyn SppSocket>, Option<String>)> {
        Err(LinkError::TransportUnavailable(
            "SPP transport is disabled".to_string(),
        ))
    }
}
