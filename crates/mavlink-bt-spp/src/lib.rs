//! Classic Bluetooth serial port profile adapter for the MAVLink forwarder
//!
//! Implements the forwarder's SPP capabilities with RFCOMM sockets opened
//! through BlueZ. Bytes are written to the stream unchunked; the forwarder
//! awaits each write before handling its next message.
//!
//! - [`config`] - Service UUID, optional fixed channel and connect timeout
//! - [`error`] - Error types and their mapping onto link errors
//!
//! On platforms other than Linux [`BluezSppConnector`] reports the transport
//! as unavailable.

pub mod config;
pub mod error;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod fallback;

pub use config::SppConfig;
pub use error::SppAdapterError;

#[cfg(target_os = "linux")]
pub use linux::BluezSppConnector;
#[cfg(not(target_os = "linux"))]
pub use fallback::BluezSppConnector;
