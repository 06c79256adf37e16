//! Link-layer forwarder for MAVLink bytes over Bluetooth
//!
//! This crate owns the single active link between a MAVLink byte producer and
//! one remote peripheral. It is transport-agnostic: the BLE and SPP adapters
//! plug in through the capability traits in [`transport`].
//!
//! ## Architecture
//!
//! - [`config`] - Forwarder configuration and transport policy
//! - [`error`] - Link error taxonomy
//! - [`protocol`] - NUS service constants and MTU rules
//! - [`chunking`] - Splitting outbound buffers into MTU-sized fragments
//! - [`queue`] - FIFO write queue with a single in-flight write
//! - [`event`] - Lifecycle events reported to the owning application
//! - [`transport`] - Capability traits implemented by transport adapters
//! - [`link`] - The link state machine's state and identity types
//! - [`forwarder`] - The serialized worker and its command surface
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mavlink_bt_core::{DisabledSpp, Forwarder, ForwarderConfig, LinkEvent};
//! # use mavlink_bt_core::BleCentral;
//!
//! # async fn example(central: Box<dyn BleCentral>) -> Result<(), Box<dyn std::error::Error>> {
//! let (forwarder, mut events, _worker) =
//!     Forwarder::spawn_with_channel(ForwarderConfig::default(), central, Box::new(DisabledSpp))?;
//!
//! forwarder.connect("AA:BB:CC:DD:EE:FF");
//! while let Some(event) = events.recv().await {
//!     if let LinkEvent::Connected { .. } = event {
//!         forwarder.send(&[0xFD, 0x09, 0x00]);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod transport;

pub use chunking::{chunk, fragment_count, Fragment};
pub use config::{ForwarderConfig, TransportPolicy};
pub use error::{LinkError, Result};
pub use event::{
    create_event_channel, CallbackSink, EventReceiver, EventSender, EventSink, LinkEvent,
};
pub use forwarder::{Forwarder, RawFrameSink};
pub use link::{LinkIdentity, LinkPhase, LinkSnapshot};
pub use protocol::{
    Mtu, NUS_RX_CHARACTERISTIC_UUID, NUS_SERVICE_UUID, NUS_TX_CHARACTERISTIC_UUID,
    REQUESTED_ATT_MTU, SPP_UUID,
};
pub use queue::WriteQueue;
pub use transport::{
    BleCentral, DisabledSpp, GattCharacteristic, GattClient, GattService, SppConnector,
    SppSocket, TransportEvent, TransportEventSender, TransportKind,
};
